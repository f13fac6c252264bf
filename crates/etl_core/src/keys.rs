use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use uuid::Uuid;

/// Records carrying a random primary key assigned after transformation.
pub trait SurrogateKeyed {
    fn set_surrogate_key(&mut self, key: String);
}

/// URL-safe, unpadded base64 of a v4 UUID followed by 16 random bytes.
pub fn generate_surrogate_key() -> String {
    let mut raw = [0u8; 32];
    raw[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    rand::thread_rng().fill_bytes(&mut raw[16..]);
    URL_SAFE_NO_PAD.encode(raw)
}

pub fn assign_surrogate_keys<R: SurrogateKeyed>(records: &mut [R]) {
    for record in records {
        record.set_surrogate_key(generate_surrogate_key());
    }
}
