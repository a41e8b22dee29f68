use std::{borrow::Borrow, borrow::Cow, collections::HashMap, hash::Hash, mem};

use anyhow::bail;

/// A single value or every value seen for a repeated key.
#[derive(Debug, Eq, PartialEq)]
pub enum Value<T> {
    Scalar(T),
    Vector(Vec<T>),
}

impl<T: Default> Value<T> {
    fn push(&mut self, new: T) {
        match self {
            Self::Vector(inner) => inner.push(new),
            Self::Scalar(inner) => {
                let first = mem::take(inner);
                *self = Self::Vector(vec![first, new]);
            }
        }
    }
}

impl<T> Value<T> {
    fn as_slice(&self) -> &[T] {
        match self {
            Self::Scalar(scalar) => std::slice::from_ref(scalar),
            Self::Vector(vector) => vector,
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::Scalar(value)
    }
}

#[derive(Debug)]
pub struct MultiMap<K, T>(HashMap<K, Value<T>>);

impl<K, T> MultiMap<K, T>
where
    K: Eq + Hash,
    T: Default,
{
    pub fn new_empty() -> Self {
        Self(HashMap::new())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert_scalar(&mut self, key: K, scalar: T) {
        if let Some(current) = self.0.get_mut(&key) {
            current.push(scalar);
        } else {
            self.0.insert(key, Value::from(scalar));
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&Value<T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.0.get(key)
    }

    pub fn get_scalar<Q>(&self, key: &Q) -> anyhow::Result<Option<&T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.0.get(key) {
            Some(Value::Scalar(scalar)) => Ok(Some(scalar)),
            Some(Value::Vector(_)) => bail!("not scalar"),
            None => Ok(None),
        }
    }

    pub fn get_value_iter<'a, Q>(&'a self, key: &Q) -> Option<impl Iterator<Item = &'a T> + 'a>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).map(|v| v.as_slice().iter())
    }
}

impl<K> MultiMap<K, String>
where
    K: Eq + Hash,
{
    /// Every value of `key` joined by `sep`, borrowed when there is only one.
    pub fn get_joined<Q>(&self, key: &Q, sep: &str) -> Option<Cow<'_, str>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.0.get(key)? {
            Value::Scalar(scalar) => Some(Cow::Borrowed(scalar.as_str())),
            Value::Vector(vector) => Some(Cow::Owned(vector.join(sep))),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MultiMap<K, V>
where
    K: Eq + Hash,
    V: Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut mm = Self::new_empty();
        for (k, v) in iter {
            mm.insert_scalar(k, v);
        }
        mm
    }
}
