use std::sync::Arc;

use tracing::Instrument;

use crate::domain::entity::{RotationEvent, RotationState, RotationStep, StageUpdate, VersionStage};
use crate::domain::error::RotationError;
use crate::domain::repository::SecretStore;
use crate::usecase::RotationWorkflow;

/// RotateSecretUseCase はローテーションイベントを解釈して各フェーズを実行する。
/// フェーズ内で失敗した場合は token のバージョンから pending を外してから元のエラーを返す。
pub struct RotateSecretUseCase {
    store: Arc<dyn SecretStore>,
    workflow: Arc<dyn RotationWorkflow>,
}

impl RotateSecretUseCase {
    pub fn new(store: Arc<dyn SecretStore>, workflow: Arc<dyn RotationWorkflow>) -> Self {
        Self { store, workflow }
    }

    pub fn workflow_name(&self) -> &'static str {
        self.workflow.name()
    }

    pub async fn execute(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let span = tracing::info_span!(
            "rotation",
            workflow = self.workflow.name(),
            secret_id = %event.secret_id,
            token = %event.client_request_token,
            step = %event.step,
        );

        async {
            let result = self.dispatch(event).await;
            if let Err(ref err) = result {
                self.rollback(event, err).await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let step: RotationStep = event
            .step
            .parse()
            .map_err(RotationError::UnknownStep)?;

        tracing::info!(from = %RotationState::Idle, to = %step.state(), "rotation step started");

        match step {
            RotationStep::CreateSecret => self.workflow.create_secret(event).await?,
            RotationStep::SetSecret => self.workflow.set_secret(event).await?,
            RotationStep::TestSecret => self.workflow.test_secret(event).await?,
            RotationStep::FinishSecret => self.finish_secret(event).await?,
        }

        tracing::info!(state = %step.state(), "rotation step completed");
        Ok(())
    }

    /// current を token のバージョンへ移す。token が既に current なら何もしない。
    /// token 以外のバージョンにステージが一つも無い新規シークレットでは、
    /// 移動元なしで token に current を付ける。
    async fn finish_secret(&self, event: &RotationEvent) -> Result<(), RotationError> {
        let versions = self
            .store
            .list_versions(&event.secret_id)
            .await?
            .ok_or_else(|| RotationError::MissingField("Versions".to_string()))?;

        let Some(current) = versions.iter().find(|v| v.has_stage(VersionStage::Current)) else {
            let token_listed = versions
                .iter()
                .any(|v| v.version_id == event.client_request_token);
            let fresh = versions
                .iter()
                .all(|v| v.version_id == event.client_request_token || v.stages.is_empty());
            if !(token_listed && fresh) {
                return Err(RotationError::MissingField(VersionStage::Current.to_string()));
            }
            self.store
                .move_stage(
                    &event.secret_id,
                    &StageUpdate::attach_current(&event.client_request_token),
                )
                .await?;
            tracing::info!(
                new_version = %event.client_request_token,
                "first current stage attached"
            );
            return Ok(());
        };

        if current.version_id == event.client_request_token {
            tracing::info!(
                version_id = %current.version_id,
                "version already marked as current"
            );
            return Ok(());
        }

        self.store
            .move_stage(
                &event.secret_id,
                &StageUpdate::promote(&event.client_request_token, &current.version_id),
            )
            .await?;

        tracing::info!(
            previous_version = %current.version_id,
            new_version = %event.client_request_token,
            "current stage moved"
        );
        Ok(())
    }

    async fn rollback(&self, event: &RotationEvent, cause: &RotationError) {
        tracing::warn!(error = %cause, "rotation step failed, rolling back pending version");

        match self
            .store
            .move_stage(
                &event.secret_id,
                &StageUpdate::remove_pending(&event.client_request_token),
            )
            .await
        {
            Ok(()) => {
                tracing::info!(state = %RotationState::RolledBack, "pending stage removed");
            }
            Err(rollback_err) => {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %cause,
                    "failed to roll back pending version"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::SecretVersion;
    use crate::domain::repository::secret_store::{MockSecretStore, SecretStoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 呼び出し回数を数え、指定された結果を返すテスト用ワークフロー。
    #[derive(Default)]
    struct StubWorkflow {
        create_calls: AtomicUsize,
        set_calls: AtomicUsize,
        test_calls: AtomicUsize,
        fail_with: Option<RotationError>,
    }

    impl StubWorkflow {
        fn failing(err: RotationError) -> Self {
            Self {
                fail_with: Some(err),
                ..Default::default()
            }
        }

        fn result(&self) -> Result<(), RotationError> {
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RotationWorkflow for StubWorkflow {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn create_secret(&self, _event: &RotationEvent) -> Result<(), RotationError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn set_secret(&self, _event: &RotationEvent) -> Result<(), RotationError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.result()
        }

        async fn test_secret(&self, _event: &RotationEvent) -> Result<(), RotationError> {
            self.test_calls.fetch_add(1, Ordering::SeqCst);
            self.result()
        }
    }

    fn versions(items: &[(&str, &[&str])]) -> Vec<SecretVersion> {
        items
            .iter()
            .map(|(id, stages)| SecretVersion {
                version_id: (*id).to_string(),
                stages: stages.iter().map(|s| (*s).to_string()).collect(),
            })
            .collect()
    }

    fn expect_rollback(store: &mut MockSecretStore, token: &'static str) {
        store
            .expect_move_stage()
            .withf(move |secret_id, update| {
                secret_id == "acct-1" && *update == StageUpdate::remove_pending(token)
            })
            .times(1)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn test_dispatches_to_workflow() {
        let workflow = Arc::new(StubWorkflow::default());
        let uc = RotateSecretUseCase::new(Arc::new(MockSecretStore::new()), workflow.clone());

        uc.execute(&RotationEvent::new("acct-1", "tok-1", "createSecret"))
            .await
            .unwrap();
        uc.execute(&RotationEvent::new("acct-1", "tok-1", "setSecret"))
            .await
            .unwrap();
        uc.execute(&RotationEvent::new("acct-1", "tok-1", "testSecret"))
            .await
            .unwrap();

        assert_eq!(workflow.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(workflow.set_calls.load(Ordering::SeqCst), 1);
        assert_eq!(workflow.test_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_step_rolls_back() {
        let mut store = MockSecretStore::new();
        expect_rollback(&mut store, "tok-1");
        let workflow = Arc::new(StubWorkflow::default());
        let uc = RotateSecretUseCase::new(Arc::new(store), workflow.clone());

        let err = uc
            .execute(&RotationEvent::new("acct-1", "tok-1", "deleteSecret"))
            .await
            .unwrap_err();

        assert_eq!(err, RotationError::UnknownStep("deleteSecret".to_string()));
        assert_eq!(workflow.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_phase_failure_rolls_back_and_returns_original_error() {
        let mut store = MockSecretStore::new();
        expect_rollback(&mut store, "tok-9");
        let workflow = Arc::new(StubWorkflow::failing(RotationError::Acme(
            "rate limited".to_string(),
        )));
        let uc = RotateSecretUseCase::new(Arc::new(store), workflow);

        let err = uc
            .execute(&RotationEvent::new("acct-1", "tok-9", "setSecret"))
            .await
            .unwrap_err();
        assert_eq!(err, RotationError::Acme("rate limited".to_string()));
    }

    #[tokio::test]
    async fn test_rollback_failure_does_not_mask_original_error() {
        let mut store = MockSecretStore::new();
        store
            .expect_move_stage()
            .returning(|_, _| Err(SecretStoreError::Unavailable("throttled".to_string())));
        let workflow = Arc::new(StubWorkflow::failing(RotationError::MissingField(
            "accountKey".to_string(),
        )));
        let uc = RotateSecretUseCase::new(Arc::new(store), workflow);

        let err = uc
            .execute(&RotationEvent::new("acct-1", "tok-1", "createSecret"))
            .await
            .unwrap_err();
        assert_eq!(err, RotationError::MissingField("accountKey".to_string()));
    }

    #[tokio::test]
    async fn test_finish_moves_current_to_token() {
        let mut store = MockSecretStore::new();
        store
            .expect_list_versions()
            .returning(|_| Ok(Some(versions(&[("v1", &["AWSCURRENT"]), ("v2", &[])]))));
        store
            .expect_move_stage()
            .withf(|secret_id, update| {
                secret_id == "acct-1" && *update == StageUpdate::promote("v2", "v1")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        uc.execute(&RotationEvent::new("acct-1", "v2", "finishSecret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finish_without_current_fails_with_missing_field() {
        let mut store = MockSecretStore::new();
        store
            .expect_list_versions()
            .returning(|_| Ok(Some(versions(&[("v1", &["AWSPREVIOUS"]), ("v2", &["AWSPENDING"])]))));
        expect_rollback(&mut store, "v2");
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        let err = uc
            .execute(&RotationEvent::new("acct-1", "v2", "finishSecret"))
            .await
            .unwrap_err();
        assert_eq!(err, RotationError::MissingField("AWSCURRENT".to_string()));
    }

    #[tokio::test]
    async fn test_finish_on_fresh_secret_attaches_current() {
        let mut store = MockSecretStore::new();
        store
            .expect_list_versions()
            .returning(|_| Ok(Some(versions(&[("v0", &[]), ("tok-1", &["AWSPENDING"])]))));
        store
            .expect_move_stage()
            .withf(|secret_id, update| {
                secret_id == "acct-1" && *update == StageUpdate::attach_current("tok-1")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        uc.execute(&RotationEvent::new("acct-1", "tok-1", "finishSecret"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finish_without_current_for_unlisted_token_fails() {
        let mut store = MockSecretStore::new();
        store
            .expect_list_versions()
            .returning(|_| Ok(Some(versions(&[("v0", &[])]))));
        expect_rollback(&mut store, "tok-1");
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        let err = uc
            .execute(&RotationEvent::new("acct-1", "tok-1", "finishSecret"))
            .await
            .unwrap_err();
        assert_eq!(err, RotationError::MissingField("AWSCURRENT".to_string()));
    }

    #[tokio::test]
    async fn test_finish_without_version_list_fails_with_missing_field() {
        let mut store = MockSecretStore::new();
        store.expect_list_versions().returning(|_| Ok(None));
        expect_rollback(&mut store, "v2");
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        let err = uc
            .execute(&RotationEvent::new("acct-1", "v2", "finishSecret"))
            .await
            .unwrap_err();
        assert!(matches!(err, RotationError::MissingField(_)));
    }

    #[tokio::test]
    async fn test_finish_is_noop_when_token_already_current() {
        let mut store = MockSecretStore::new();
        store
            .expect_list_versions()
            .returning(|_| Ok(Some(versions(&[("v1", &["AWSPREVIOUS"]), ("v2", &["AWSCURRENT"])]))));
        store.expect_move_stage().never();
        let uc = RotateSecretUseCase::new(Arc::new(store), Arc::new(StubWorkflow::default()));

        uc.execute(&RotationEvent::new("acct-1", "v2", "finishSecret"))
            .await
            .unwrap();
    }
}
