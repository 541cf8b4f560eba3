use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Error;

/// ServiceKind enumerates the alert services a rule may notify.
/// Its ordering is the order in which handlers are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKind {
    Post,
    Tcp,
    Email,
    Exec,
    Log,
    VictorOps,
    PagerDuty,
    PagerDuty2,
    Pushover,
    Sensu,
    Slack,
    Telegram,
    HipChat,
    Alerta,
    OpsGenie,
    OpsGenie2,
    Talk,
    Kafka,
}

impl ServiceKind {
    /// Name of the service, which is both its JSON key and its TICKscript method.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Post => "post",
            ServiceKind::Tcp => "tcp",
            ServiceKind::Email => "email",
            ServiceKind::Exec => "exec",
            ServiceKind::Log => "log",
            ServiceKind::VictorOps => "victorOps",
            ServiceKind::PagerDuty => "pagerDuty",
            ServiceKind::PagerDuty2 => "pagerDuty2",
            ServiceKind::Pushover => "pushover",
            ServiceKind::Sensu => "sensu",
            ServiceKind::Slack => "slack",
            ServiceKind::Telegram => "telegram",
            ServiceKind::HipChat => "hipChat",
            ServiceKind::Alerta => "alerta",
            ServiceKind::OpsGenie => "opsGenie",
            ServiceKind::OpsGenie2 => "opsGenie2",
            ServiceKind::Talk => "talk",
            ServiceKind::Kafka => "kafka",
        }
    }

    pub fn all() -> &'static [ServiceKind] {
        &[
            ServiceKind::Post,
            ServiceKind::Tcp,
            ServiceKind::Email,
            ServiceKind::Exec,
            ServiceKind::Log,
            ServiceKind::VictorOps,
            ServiceKind::PagerDuty,
            ServiceKind::PagerDuty2,
            ServiceKind::Pushover,
            ServiceKind::Sensu,
            ServiceKind::Slack,
            ServiceKind::Telegram,
            ServiceKind::HipChat,
            ServiceKind::Alerta,
            ServiceKind::OpsGenie,
            ServiceKind::OpsGenie2,
            ServiceKind::Talk,
            ServiceKind::Kafka,
        ]
    }

    pub fn from_name(name: &str) -> crate::Result<ServiceKind> {
        ServiceKind::all()
            .iter()
            .find(|kind| kind.name() == name)
            .copied()
            .ok_or_else(|| Error::UnknownService(name.to_string()))
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Tcp {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Exec {
    pub command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Log {
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VictorOps {
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PagerDuty {
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PagerDuty2 {
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Pushover {
    pub user_key: String,
    pub device: String,
    pub title: String,
    pub url: String,
    pub url_title: String,
    pub sound: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Sensu {
    pub source: String,
    pub handlers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Slack {
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
    pub workspace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Telegram {
    pub chat_id: String,
    pub parse_mode: String,
    pub disable_web_page_preview: bool,
    pub disable_notification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HipChat {
    pub room: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Alerta {
    pub token: String,
    pub resource: String,
    pub event: String,
    pub environment: String,
    pub group: String,
    pub value: String,
    pub origin: String,
    pub services: Vec<String>,
}

/// OpsGenie properties are shared by both the v1 and v2 services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OpsGenie {
    pub teams: Vec<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Talk {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Kafka {
    pub cluster: String,
    pub topic: String,
    pub template: String,
}

/// AlertHandler is a single configured notification target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertHandler {
    Post(Post),
    Tcp(Tcp),
    Email(Email),
    Exec(Exec),
    Log(Log),
    VictorOps(VictorOps),
    PagerDuty(PagerDuty),
    PagerDuty2(PagerDuty2),
    Pushover(Pushover),
    Sensu(Sensu),
    Slack(Slack),
    Telegram(Telegram),
    HipChat(HipChat),
    Alerta(Alerta),
    OpsGenie(OpsGenie),
    OpsGenie2(OpsGenie),
    Talk(Talk),
    Kafka(Kafka),
}

impl AlertHandler {
    pub fn kind(&self) -> ServiceKind {
        match self {
            AlertHandler::Post(_) => ServiceKind::Post,
            AlertHandler::Tcp(_) => ServiceKind::Tcp,
            AlertHandler::Email(_) => ServiceKind::Email,
            AlertHandler::Exec(_) => ServiceKind::Exec,
            AlertHandler::Log(_) => ServiceKind::Log,
            AlertHandler::VictorOps(_) => ServiceKind::VictorOps,
            AlertHandler::PagerDuty(_) => ServiceKind::PagerDuty,
            AlertHandler::PagerDuty2(_) => ServiceKind::PagerDuty2,
            AlertHandler::Pushover(_) => ServiceKind::Pushover,
            AlertHandler::Sensu(_) => ServiceKind::Sensu,
            AlertHandler::Slack(_) => ServiceKind::Slack,
            AlertHandler::Telegram(_) => ServiceKind::Telegram,
            AlertHandler::HipChat(_) => ServiceKind::HipChat,
            AlertHandler::Alerta(_) => ServiceKind::Alerta,
            AlertHandler::OpsGenie(_) => ServiceKind::OpsGenie,
            AlertHandler::OpsGenie2(_) => ServiceKind::OpsGenie2,
            AlertHandler::Talk(_) => ServiceKind::Talk,
            AlertHandler::Kafka(_) => ServiceKind::Kafka,
        }
    }

    /// Default handler of the given kind, with every property empty.
    pub fn empty(kind: ServiceKind) -> AlertHandler {
        match kind {
            ServiceKind::Post => AlertHandler::Post(Post::default()),
            ServiceKind::Tcp => AlertHandler::Tcp(Tcp::default()),
            ServiceKind::Email => AlertHandler::Email(Email::default()),
            ServiceKind::Exec => AlertHandler::Exec(Exec::default()),
            ServiceKind::Log => AlertHandler::Log(Log::default()),
            ServiceKind::VictorOps => AlertHandler::VictorOps(VictorOps::default()),
            ServiceKind::PagerDuty => AlertHandler::PagerDuty(PagerDuty::default()),
            ServiceKind::PagerDuty2 => AlertHandler::PagerDuty2(PagerDuty2::default()),
            ServiceKind::Pushover => AlertHandler::Pushover(Pushover::default()),
            ServiceKind::Sensu => AlertHandler::Sensu(Sensu::default()),
            ServiceKind::Slack => AlertHandler::Slack(Slack::default()),
            ServiceKind::Telegram => AlertHandler::Telegram(Telegram::default()),
            ServiceKind::HipChat => AlertHandler::HipChat(HipChat::default()),
            ServiceKind::Alerta => AlertHandler::Alerta(Alerta::default()),
            ServiceKind::OpsGenie => AlertHandler::OpsGenie(OpsGenie::default()),
            ServiceKind::OpsGenie2 => AlertHandler::OpsGenie2(OpsGenie::default()),
            ServiceKind::Talk => AlertHandler::Talk(Talk::default()),
            ServiceKind::Kafka => AlertHandler::Kafka(Kafka::default()),
        }
    }
}

/// AlertNodes are the notification settings of an AlertRule.
///
/// Handlers are always held in ServiceKind order, and handlers of the
/// same kind keep the order in which they were pushed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Wire", into = "Wire")]
pub struct AlertNodes {
    pub state_changes_only: bool,
    handlers: Vec<AlertHandler>,
}

impl AlertNodes {
    pub fn push(&mut self, handler: AlertHandler) {
        let kind = handler.kind();
        let index = self.handlers.partition_point(|h| h.kind() <= kind);
        self.handlers.insert(index, handler);
    }

    pub fn handlers(&self) -> &[AlertHandler] {
        &self.handlers
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl FromIterator<AlertHandler> for AlertNodes {
    fn from_iter<I: IntoIterator<Item = AlertHandler>>(iter: I) -> Self {
        let mut nodes = AlertNodes::default();
        for handler in iter {
            nodes.push(handler);
        }
        nodes
    }
}

// JSON shape of AlertNodes: an object of handler arrays keyed by service name.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Wire {
    state_changes_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    post: Vec<Post>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tcp: Vec<Tcp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    email: Vec<Email>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exec: Vec<Exec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    log: Vec<Log>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    victor_ops: Vec<VictorOps>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pager_duty: Vec<PagerDuty>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pager_duty2: Vec<PagerDuty2>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pushover: Vec<Pushover>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sensu: Vec<Sensu>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    slack: Vec<Slack>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    telegram: Vec<Telegram>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hip_chat: Vec<HipChat>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alerta: Vec<Alerta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ops_genie: Vec<OpsGenie>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ops_genie2: Vec<OpsGenie>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    talk: Vec<Talk>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    kafka: Vec<Kafka>,
}

impl From<Wire> for AlertNodes {
    fn from(w: Wire) -> Self {
        // Wire fields are declared in ServiceKind order, so a plain
        // concatenation is already sorted.
        let handlers = std::iter::empty()
            .chain(w.post.into_iter().map(AlertHandler::Post))
            .chain(w.tcp.into_iter().map(AlertHandler::Tcp))
            .chain(w.email.into_iter().map(AlertHandler::Email))
            .chain(w.exec.into_iter().map(AlertHandler::Exec))
            .chain(w.log.into_iter().map(AlertHandler::Log))
            .chain(w.victor_ops.into_iter().map(AlertHandler::VictorOps))
            .chain(w.pager_duty.into_iter().map(AlertHandler::PagerDuty))
            .chain(w.pager_duty2.into_iter().map(AlertHandler::PagerDuty2))
            .chain(w.pushover.into_iter().map(AlertHandler::Pushover))
            .chain(w.sensu.into_iter().map(AlertHandler::Sensu))
            .chain(w.slack.into_iter().map(AlertHandler::Slack))
            .chain(w.telegram.into_iter().map(AlertHandler::Telegram))
            .chain(w.hip_chat.into_iter().map(AlertHandler::HipChat))
            .chain(w.alerta.into_iter().map(AlertHandler::Alerta))
            .chain(w.ops_genie.into_iter().map(AlertHandler::OpsGenie))
            .chain(w.ops_genie2.into_iter().map(AlertHandler::OpsGenie2))
            .chain(w.talk.into_iter().map(AlertHandler::Talk))
            .chain(w.kafka.into_iter().map(AlertHandler::Kafka))
            .collect();

        AlertNodes {
            state_changes_only: w.state_changes_only,
            handlers,
        }
    }
}

impl From<AlertNodes> for Wire {
    fn from(nodes: AlertNodes) -> Self {
        let mut w = Wire {
            state_changes_only: nodes.state_changes_only,
            ..Default::default()
        };
        for handler in nodes.handlers {
            match handler {
                AlertHandler::Post(h) => w.post.push(h),
                AlertHandler::Tcp(h) => w.tcp.push(h),
                AlertHandler::Email(h) => w.email.push(h),
                AlertHandler::Exec(h) => w.exec.push(h),
                AlertHandler::Log(h) => w.log.push(h),
                AlertHandler::VictorOps(h) => w.victor_ops.push(h),
                AlertHandler::PagerDuty(h) => w.pager_duty.push(h),
                AlertHandler::PagerDuty2(h) => w.pager_duty2.push(h),
                AlertHandler::Pushover(h) => w.pushover.push(h),
                AlertHandler::Sensu(h) => w.sensu.push(h),
                AlertHandler::Slack(h) => w.slack.push(h),
                AlertHandler::Telegram(h) => w.telegram.push(h),
                AlertHandler::HipChat(h) => w.hip_chat.push(h),
                AlertHandler::Alerta(h) => w.alerta.push(h),
                AlertHandler::OpsGenie(h) => w.ops_genie.push(h),
                AlertHandler::OpsGenie2(h) => w.ops_genie2.push(h),
                AlertHandler::Talk(h) => w.talk.push(h),
                AlertHandler::Kafka(h) => w.kafka.push(h),
            }
        }
        w
    }
}
