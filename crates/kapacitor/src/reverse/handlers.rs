use models::{AlertHandler, ServiceKind};

use crate::{Error, Result};

/// Property methods of each alert service.
pub fn properties(kind: ServiceKind) -> &'static [&'static str] {
    match kind {
        ServiceKind::Post => &["header"],
        ServiceKind::Email => &["to"],
        ServiceKind::VictorOps | ServiceKind::PagerDuty2 => &["routingKey"],
        ServiceKind::PagerDuty => &["serviceKey"],
        ServiceKind::Pushover => &["userKey", "device", "title", "url", "urlTitle", "sound"],
        ServiceKind::Sensu => &["source", "handlers"],
        ServiceKind::Slack => &["channel", "username", "iconEmoji", "workspace"],
        ServiceKind::Telegram => &[
            "chatId",
            "parseMode",
            "disableWebPagePreview",
            "disableNotification",
        ],
        ServiceKind::HipChat => &["room", "token"],
        ServiceKind::Alerta => &[
            "token",
            "resource",
            "event",
            "environment",
            "group",
            "value",
            "origin",
            "services",
        ],
        ServiceKind::OpsGenie | ServiceKind::OpsGenie2 => &["teams", "recipients"],
        ServiceKind::Kafka => &["cluster", "kafkaTopic", "template"],
        ServiceKind::Tcp | ServiceKind::Exec | ServiceKind::Log | ServiceKind::Talk => &[],
    }
}

/// Begin a handler from its service method and arguments.
pub fn start(kind: ServiceKind, args: Vec<String>) -> Result<AlertHandler> {
    let mut handler = AlertHandler::empty(kind);

    match &mut handler {
        AlertHandler::Post(h) if args.len() <= 1 => {
            h.url = args.into_iter().next().unwrap_or_default()
        }
        AlertHandler::Tcp(h) => h.address = one(kind.name(), args)?,
        AlertHandler::Email(h) => h.to = args,
        AlertHandler::Exec(h) => h.command = args,
        AlertHandler::Log(h) => h.file_path = one(kind.name(), args)?,
        _ if !args.is_empty() => return Err(Error::InvalidArgument(kind.name().to_string())),
        _ => {}
    }
    Ok(handler)
}

/// Apply a property method of the handler's service.
pub fn apply(handler: &mut AlertHandler, method: &str, args: Vec<String>) -> Result<()> {
    let flag = |args: Vec<String>| {
        if args.is_empty() {
            Ok(true)
        } else {
            Err(Error::InvalidArgument(method.to_string()))
        }
    };

    match (handler, method) {
        (AlertHandler::Post(h), "header") => {
            let [key, value]: [String; 2] = args
                .try_into()
                .map_err(|_| Error::InvalidArgument(method.to_string()))?;
            h.headers.insert(key, value);
        }
        (AlertHandler::Email(h), "to") => h.to.extend(args),
        (AlertHandler::VictorOps(h), "routingKey") => h.routing_key = one(method, args)?,
        (AlertHandler::PagerDuty(h), "serviceKey") => h.service_key = one(method, args)?,
        (AlertHandler::PagerDuty2(h), "routingKey") => h.routing_key = one(method, args)?,
        (AlertHandler::Pushover(h), _) => {
            let value = one(method, args)?;
            match method {
                "userKey" => h.user_key = value,
                "device" => h.device = value,
                "title" => h.title = value,
                "url" => h.url = value,
                "urlTitle" => h.url_title = value,
                "sound" => h.sound = value,
                _ => return Err(Error::UnknownServiceMethod(method.to_string())),
            }
        }
        (AlertHandler::Sensu(h), "source") => h.source = one(method, args)?,
        (AlertHandler::Sensu(h), "handlers") => h.handlers.extend(args),
        (AlertHandler::Slack(h), _) => {
            let value = one(method, args)?;
            match method {
                "channel" => h.channel = value,
                "username" => h.username = value,
                "iconEmoji" => h.icon_emoji = value,
                "workspace" => h.workspace = value,
                _ => return Err(Error::UnknownServiceMethod(method.to_string())),
            }
        }
        (AlertHandler::Telegram(h), "chatId") => h.chat_id = one(method, args)?,
        (AlertHandler::Telegram(h), "parseMode") => h.parse_mode = one(method, args)?,
        (AlertHandler::Telegram(h), "disableWebPagePreview") => {
            h.disable_web_page_preview = flag(args)?
        }
        (AlertHandler::Telegram(h), "disableNotification") => {
            h.disable_notification = flag(args)?
        }
        (AlertHandler::HipChat(h), "room") => h.room = one(method, args)?,
        (AlertHandler::HipChat(h), "token") => h.token = one(method, args)?,
        (AlertHandler::Alerta(h), "services") => h.services.extend(args),
        (AlertHandler::Alerta(h), _) => {
            let value = one(method, args)?;
            match method {
                "token" => h.token = value,
                "resource" => h.resource = value,
                "event" => h.event = value,
                "environment" => h.environment = value,
                "group" => h.group = value,
                "value" => h.value = value,
                "origin" => h.origin = value,
                _ => return Err(Error::UnknownServiceMethod(method.to_string())),
            }
        }
        (AlertHandler::OpsGenie(h) | AlertHandler::OpsGenie2(h), "teams") => h.teams.extend(args),
        (AlertHandler::OpsGenie(h) | AlertHandler::OpsGenie2(h), "recipients") => {
            h.recipients.extend(args)
        }
        (AlertHandler::Kafka(h), "cluster") => h.cluster = one(method, args)?,
        (AlertHandler::Kafka(h), "kafkaTopic") => h.topic = one(method, args)?,
        (AlertHandler::Kafka(h), "template") => h.template = one(method, args)?,
        _ => return Err(Error::UnknownServiceMethod(method.to_string())),
    }
    Ok(())
}

fn one(method: &str, args: Vec<String>) -> Result<String> {
    let [value]: [String; 1] = args
        .try_into()
        .map_err(|_| Error::InvalidArgument(method.to_string()))?;
    Ok(value)
}
