pub mod account;
pub mod certificate;
pub mod key_config;
pub mod rotation;

pub use account::AccountRecord;
pub use certificate::CertificateRecord;
pub use key_config::{EcCurve, KeyConfig, KeySpec, KeyType};
pub use rotation::{
    RotationEvent, RotationState, RotationStep, SecretVersion, StageUpdate, VersionStage,
};
