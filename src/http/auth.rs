//! Static shared-secret authorization. Every request except the exposition endpoint has to carry
//! one of the configured keys in the `x-api-key` header.

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web::Data,
    Error,
};
use openssl::memcmp;

use super::METRICS_PATH;
use crate::errors::NexusError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Vec<String>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut api_keys = ApiKeys::default();
        for key in keys {
            api_keys.add(key);
        }
        api_keys
    }

    /// Adds a key unless it is empty or already known.
    pub fn add<S: Into<String>>(&mut self, key: S) {
        let key = key.into();
        if key.is_empty() || self.keys.contains(&key) {
            return;
        }
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks a presented key. An absent or empty key is `ErrApiKeyMissing`, a key matching none of
    /// the configured ones is `ErrApiKeyInvalid`.
    pub fn validate(&self, presented: Option<&str>) -> Result<(), NexusError> {
        let presented = match presented {
            Some(key) if !key.is_empty() => key,
            _ => return Err(NexusError::ErrApiKeyMissing),
        };

        let matched = self
            .keys
            .iter()
            .any(|key| key.len() == presented.len() && memcmp::eq(key.as_bytes(), presented.as_bytes()));
        if matched {
            Ok(())
        } else {
            Err(NexusError::ErrApiKeyInvalid)
        }
    }
}

pub async fn api_key_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, Error> {
    if req.path() == METRICS_PATH {
        return Ok(next.call(req).await?.map_into_left_body());
    }

    let result = match req.app_data::<Data<ApiKeys>>() {
        Some(api_keys) => {
            let presented = match req.headers().get(API_KEY_HEADER) {
                // a header that is not valid text cannot match any key
                Some(value) => Some(value.to_str().unwrap_or("\u{0}")),
                None => None,
            };
            api_keys.validate(presented)
        }
        None => Err(NexusError::ErrApiKeyInvalid),
    };

    match result {
        Ok(()) => Ok(next.call(req).await?.map_into_left_body()),
        Err(e) => {
            log::debug!("rejected {} {}: {}", req.method(), req.path(), e);
            Ok(req.error_response(e).map_into_right_body())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_api_keys_validate() {
        let mut keys = ApiKeys::new(["Hello World", "second-key"]);
        keys.add("Hello World");
        keys.add("");
        assert_eq!(keys.len(), 2);

        assert!(keys.validate(Some("Hello World")).is_ok());
        assert!(keys.validate(Some("second-key")).is_ok());
        assert_eq!(keys.validate(None).unwrap_err(), NexusError::ErrApiKeyMissing);
        assert_eq!(keys.validate(Some("")).unwrap_err(), NexusError::ErrApiKeyMissing);
        assert_eq!(keys.validate(Some("Hello")).unwrap_err(), NexusError::ErrApiKeyInvalid);
        assert_eq!(keys.validate(Some("hello world")).unwrap_err(), NexusError::ErrApiKeyInvalid);

        let empty = ApiKeys::default();
        assert!(empty.is_empty());
        assert_eq!(empty.validate(Some("anything")).unwrap_err(), NexusError::ErrApiKeyInvalid);
    }
}
