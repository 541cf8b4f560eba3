mod alert;
mod handlers;
mod query;

pub use alert::{AlertRule, Change, Operator, TriggerKind, TriggerValues, DBRP};
pub use handlers::{
    Alerta, AlertHandler, AlertNodes, Email, Exec, HipChat, Kafka, Log, OpsGenie, PagerDuty,
    PagerDuty2, Post, Pushover, Sensu, ServiceKind, Slack, Talk, Tcp, Telegram, VictorOps,
};
pub use query::{DurationRange, Field, FieldKind, GroupBy, QueryConfig, Tags};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unknown trigger type {0:?}")]
    UnknownTrigger(String),
    #[error("unknown operator {0:?}")]
    UnknownOperator(String),
    #[error("unknown change type {0:?}")]
    UnknownChange(String),
    #[error("unknown alert service {0:?}")]
    UnknownService(String),
}

pub type Result<T> = std::result::Result<T, Error>;
