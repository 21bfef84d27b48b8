use ethers::types::H256;
use serde::Serialize;
use tokio::sync::mpsc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    FetchContent,
    Dedup,
    SegmentUpload,
    Submit,
    Confirm,
    Schedule,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FetchContent => "fetch-content",
            Stage::Dedup => "dedup",
            Stage::SegmentUpload => "segment-upload",
            Stage::Submit => "submit",
            Stage::Confirm => "confirm",
            Stage::Schedule => "schedule",
        };
        write!(f, "{}", name)
    }
}

/// Observable events emitted by the pipeline and scheduler.
///
/// Consumed by the presentation layer (the binary's logging task); the
/// pipeline never reads these back.
#[derive(Debug, Clone, Serialize)]
pub enum UploadEvent {
    StageStart {
        stage: Stage,
        detail: String,
    },
    StageSuccess {
        stage: Stage,
        detail: String,
    },
    StageWarning {
        stage: Stage,
        detail: String,
    },
    StageError {
        stage: Stage,
        detail: String,
    },
    TransactionSubmitted {
        tx_hash: H256,
        explorer_link: String,
    },
    RunSummary {
        accounts: usize,
        uploads_per_account: u32,
        successful: u32,
        failed: u32,
    },
}

/// Cloneable sender handle for pipeline events.
///
/// A closed or absent receiver is tolerated: events degrade to silence
/// rather than failing the pipeline.
#[derive(Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl EventSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sender that drops every event, for tests that don't observe them.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn stage_start(&self, stage: Stage, detail: impl Into<String>) {
        self.emit(UploadEvent::StageStart {
            stage,
            detail: detail.into(),
        });
    }

    pub fn stage_success(&self, stage: Stage, detail: impl Into<String>) {
        self.emit(UploadEvent::StageSuccess {
            stage,
            detail: detail.into(),
        });
    }

    pub fn stage_warning(&self, stage: Stage, detail: impl Into<String>) {
        self.emit(UploadEvent::StageWarning {
            stage,
            detail: detail.into(),
        });
    }

    pub fn stage_error(&self, stage: Stage, detail: impl Into<String>) {
        self.emit(UploadEvent::StageError {
            stage,
            detail: detail.into(),
        });
    }

    pub fn transaction_submitted(&self, tx_hash: H256, explorer_link: String) {
        self.emit(UploadEvent::TransactionSubmitted {
            tx_hash,
            explorer_link,
        });
    }
}
