// RSA signing key generation for the test provider.
use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::EncodingKey;
use rand::RngCore;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;

pub(crate) struct ProviderKey {
    pub(crate) kid: String,
    pub(crate) encoding_key: EncodingKey,
    pub(crate) n: String,
    pub(crate) e: String,
}

pub(crate) fn generate_provider_key() -> Result<ProviderKey> {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)?;
    let public_key = private_key.to_public_key();
    let private_pem = private_key.to_pkcs1_pem(Default::default())?;

    let mut kid_bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut kid_bytes);

    Ok(ProviderKey {
        kid: hex::encode(kid_bytes),
        encoding_key: EncodingKey::from_rsa_pem(private_pem.as_bytes())?,
        n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    })
}
