pub mod secret_codec;

pub use secret_codec::{decode_account, decode_certificate, encode_account, encode_certificate};
