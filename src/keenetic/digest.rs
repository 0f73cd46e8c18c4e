//! Challenge-response password digest for the router's `auth` endpoint.

use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use sha2::Sha256;

/// Computes `hex(SHA256(challenge + hex(MD5(login:realm:password))))`.
///
/// Both hex encodings are lowercase.
pub fn password_digest(login: &str, realm: &str, password: &str, challenge: &str) -> String {
    let md5 = Md5::digest(format!("{login}:{realm}:{password}").as_bytes());
    let md5_hex = HEXLOWER.encode(&md5);

    let mut sha = Sha256::new();
    sha.update(challenge.as_bytes());
    sha.update(md5_hex.as_bytes());
    HEXLOWER.encode(&sha.finalize())
}
