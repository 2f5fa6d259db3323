use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use uuid::Uuid;

use crate::models::CdnAuthParameters;

type HmacSha1 = Hmac<Sha1>;

/// Lifetime of upload parameters
pub const UPLOAD_AUTH_TTL_MINUTES: i64 = 30;

/// Signs client-side upload requests for the image CDN
pub struct CdnAuthService {
    private_key: String,
    public_key: String,
    url_endpoint: String,
}

impl CdnAuthService {
    pub fn new(private_key: String, public_key: String, url_endpoint: String) -> Self {
        Self {
            private_key,
            public_key,
            url_endpoint,
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn url_endpoint(&self) -> &str {
        &self.url_endpoint
    }

    pub fn upload_parameters(&self) -> CdnAuthParameters {
        let token = Uuid::new_v4().to_string();
        let expire = (Utc::now() + Duration::minutes(UPLOAD_AUTH_TTL_MINUTES)).timestamp();
        self.sign(token, expire)
    }

    /// hex(HMAC-SHA1(private_key, token ++ expire))
    pub fn sign(&self, token: String, expire: i64) -> CdnAuthParameters {
        let signature = match HmacSha1::new_from_slice(self.private_key.as_bytes()) {
            Ok(mut mac) => {
                mac.update(token.as_bytes());
                mac.update(expire.to_string().as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        };

        CdnAuthParameters {
            token,
            expire,
            signature,
        }
    }
}
