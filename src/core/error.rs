//! Error handling for image publishing
//!
//! This module provides the error taxonomy for the publish pipeline with
//! recovery guidance, error codes and process exit codes, using the
//! thiserror crate for ergonomic error handling.

use crate::security::command_executor::CommandError;
use thiserror::Error;

/// Main error type for image publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("設定値が不正です [{field}]: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    ConfigError(String),

    // Identity errors
    #[error("[sts] AWSアカウントIDの取得に失敗しました: {message}")]
    IdentityError { message: String },

    // Registry errors
    #[error("[ecr] リポジトリ {repository} の確認に失敗しました: {message}")]
    RepositoryLookupFailed { repository: String, message: String },

    #[error("[ecr] リポジトリ {repository} の作成に失敗しました: {message}")]
    RepositoryCreateFailed { repository: String, message: String },

    #[error("[{registry}] 認証に失敗しました: {message}")]
    AuthenticationFailed { registry: String, message: String },

    // Container tool errors
    #[error("[{step}] コマンドが失敗しました (exit code: {}): {command}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    CommandFailed {
        step: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("コマンド実行エラー: {0}")]
    Command(#[from] CommandError),

    // State errors
    #[error("不正な状態遷移です: {from} → {to}")]
    InvalidTransition { from: String, to: String },
}

impl PublishError {
    /// Process exit status for this error.
    ///
    /// Failing container-tool invocations propagate the child's exit code;
    /// everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidConfig { .. } => vec![
                "--region / --repository / --tag の値を確認してください",
                ".ecr-publish.yaml の内容を確認してください",
            ],
            Self::ConfigError(_) => vec![
                ".ecr-publish.yaml の構文を確認してください",
                "extends で指定したファイルが存在するか確認してください",
            ],
            Self::IdentityError { .. } => vec![
                "AWS認証情報を確認してください（aws configure / AWS_PROFILE）",
                "ネットワーク接続を確認してください",
                "セッショントークンの有効期限を確認してください",
            ],
            Self::RepositoryLookupFailed { .. } => vec![
                "ecr:DescribeRepositories の権限を確認してください",
                "リージョンの指定が正しいか確認してください",
            ],
            Self::RepositoryCreateFailed { .. } => vec![
                "ecr:CreateRepository の権限を確認してください",
                "リポジトリ名がECRの命名規則に従っているか確認してください",
            ],
            Self::AuthenticationFailed { .. } => vec![
                "ecr:GetAuthorizationToken の権限を確認してください",
                "コンテナツールのデーモンが起動しているか確認してください",
            ],
            Self::CommandFailed { .. } => vec![
                "コマンドの出力を確認してください",
                "Dockerfileの内容を確認してください",
            ],
            Self::Command(_) => vec![
                "コンテナツール（docker等）がインストールされているか確認してください",
                "PATHの設定を確認してください",
            ],
            Self::InvalidTransition { .. } => vec!["バグの可能性があります。再実行してください"],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::IdentityError { .. } => "IDENTITY_ERROR",
            Self::RepositoryLookupFailed { .. } => "REPOSITORY_LOOKUP_FAILED",
            Self::RepositoryCreateFailed { .. } => "REPOSITORY_CREATE_FAILED",
            Self::AuthenticationFailed { .. } => "AUTHENTICATION_FAILED",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::Command(_) => "COMMAND_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

pub type PublishResult<T> = std::result::Result<T, PublishError>;
