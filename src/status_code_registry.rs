use std::{collections::HashMap, fmt::Display};

use lazy_static::lazy_static;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

// https://www.iana.org/assignments/http-status-codes/http-status-codes.xhtml

/// The statuses this service can answer with.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, EnumIter)]
#[repr(u16)]
pub enum ReasonPhrase {
    OK = 200,
    // Redirection
    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,
    // Client Error
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    URITooLong = 414,
    RequestHeaderFieldsTooLarge = 431,
    // Server Error
    InternalServerError = 500,
}

impl ReasonPhrase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OK => "OK",
            Self::MultipleChoices => "Multiple Choices",
            Self::MovedPermanently => "Moved Permanently",
            Self::Found => "Found",
            Self::SeeOther => "See Other",
            Self::NotModified => "Not Modified",
            Self::TemporaryRedirect => "Temporary Redirect",
            Self::PermanentRedirect => "Permanent Redirect",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::URITooLong => "URI Too Long",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
        }
    }

    /// Statuses that send the client to the `Location` header.
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            Self::MovedPermanently
                | Self::Found
                | Self::SeeOther
                | Self::TemporaryRedirect
                | Self::PermanentRedirect
        )
    }
}

impl Display for ReasonPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

lazy_static! {
    static ref STATUS_CODE_REGISTRY: StatusCodeRegistry = StatusCodeRegistry::new();
}

pub fn get_reason_phrase(status_code: u16) -> Option<ReasonPhrase> {
    STATUS_CODE_REGISTRY.get_reason_phrase(status_code)
}

pub fn get_status_code(reason_phrase: ReasonPhrase) -> u16 {
    reason_phrase as u16
}

struct StatusCodeRegistry {
    reason_phrase_lookup: HashMap<u16, ReasonPhrase>,
}

impl StatusCodeRegistry {
    fn new() -> Self {
        let reason_phrase_lookup = ReasonPhrase::iter()
            .map(|reason_phrase| (reason_phrase as u16, reason_phrase))
            .collect();
        Self {
            reason_phrase_lookup,
        }
    }

    fn get_reason_phrase(&self, status_code: u16) -> Option<ReasonPhrase> {
        self.reason_phrase_lookup.get(&status_code).copied()
    }
}
