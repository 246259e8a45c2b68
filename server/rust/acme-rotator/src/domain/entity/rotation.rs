use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RotationEvent はシークレットローテーション基盤から渡される 1 回分の呼び出し。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationEvent {
    pub secret_id: String,
    pub client_request_token: String,
    pub step: String,
}

impl RotationEvent {
    pub fn new(
        secret_id: impl Into<String>,
        client_request_token: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            client_request_token: client_request_token.into(),
            step: step.into(),
        }
    }
}

/// RotationStep はローテーションの 4 つのフェーズ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    CreateSecret,
    SetSecret,
    TestSecret,
    FinishSecret,
}

impl RotationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "createSecret",
            RotationStep::SetSecret => "setSecret",
            RotationStep::TestSecret => "testSecret",
            RotationStep::FinishSecret => "finishSecret",
        }
    }

    /// ステップ実行中の状態。
    pub fn state(&self) -> RotationState {
        match self {
            RotationStep::CreateSecret => RotationState::Creating,
            RotationStep::SetSecret => RotationState::Setting,
            RotationStep::TestSecret => RotationState::Testing,
            RotationStep::FinishSecret => RotationState::Finishing,
        }
    }
}

impl FromStr for RotationStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createSecret" => Ok(RotationStep::CreateSecret),
            "setSecret" => Ok(RotationStep::SetSecret),
            "testSecret" => Ok(RotationStep::TestSecret),
            "finishSecret" => Ok(RotationStep::FinishSecret),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RotationState は 1 回の呼び出しの中での状態遷移。
/// Idle から各フェーズへ進み、失敗時は RolledBack で終わる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Creating,
    Setting,
    Testing,
    Finishing,
    RolledBack,
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RotationState::Idle => "idle",
            RotationState::Creating => "creating",
            RotationState::Setting => "setting",
            RotationState::Testing => "testing",
            RotationState::Finishing => "finishing",
            RotationState::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

/// VersionStage はシークレットバージョンに付与されるステージラベル。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionStage {
    #[serde(rename = "AWSCURRENT")]
    Current,
    #[serde(rename = "AWSPENDING")]
    Pending,
}

impl VersionStage {
    pub fn label(&self) -> &'static str {
        match self {
            VersionStage::Current => "AWSCURRENT",
            VersionStage::Pending => "AWSPENDING",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "AWSCURRENT" => Some(VersionStage::Current),
            "AWSPENDING" => Some(VersionStage::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for VersionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// SecretVersion はバージョン一覧の 1 要素。ステージは未知のラベルも含めてそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
    pub version_id: String,
    #[serde(default)]
    pub stages: Vec<String>,
}

impl SecretVersion {
    pub fn has_stage(&self, stage: VersionStage) -> bool {
        self.stages.iter().any(|s| s == stage.label())
    }
}

/// StageUpdate はステージラベルの付け替え要求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub stage: VersionStage,
    pub move_to_version: Option<String>,
    pub remove_from_version: Option<String>,
}

impl StageUpdate {
    /// token のバージョンから pending を外す（ロールバック用）。
    pub fn remove_pending(token: &str) -> Self {
        Self {
            stage: VersionStage::Pending,
            move_to_version: None,
            remove_from_version: Some(token.to_string()),
        }
    }

    /// 前の保持者がいない状態で to に current を付ける。
    pub fn attach_current(to: &str) -> Self {
        Self {
            stage: VersionStage::Current,
            move_to_version: Some(to.to_string()),
            remove_from_version: None,
        }
    }

    /// current を from から to へ移す。
    pub fn promote(to: &str, from: &str) -> Self {
        Self {
            stage: VersionStage::Current,
            move_to_version: Some(to.to_string()),
            remove_from_version: Some(from.to_string()),
        }
    }
}
