use itertools::Itertools;
use models::{AlertHandler, AlertRule};

use crate::vars::quote;
use crate::{Options, Result};

/// Chained alert handler calls of the `trigger` node, in service order.
pub fn alert_services(rule: &AlertRule, _options: &Options) -> Result<String> {
    let mut calls = Calls::default();

    if rule.alert_nodes.state_changes_only {
        calls.flag("stateChangesOnly", true);
    }
    for handler in rule.alert_nodes.handlers() {
        handler_calls(&mut calls, handler);
    }
    Ok(calls.0)
}

fn handler_calls(calls: &mut Calls, handler: &AlertHandler) {
    let name = handler.kind().name();

    match handler {
        AlertHandler::Post(h) => {
            calls.call(name, [h.url.as_str()].into_iter().filter(|u| !u.is_empty()));
            for (key, value) in &h.headers {
                calls.call("header", [key.as_str(), value.as_str()]);
            }
        }
        AlertHandler::Tcp(h) => calls.call(name, [h.address.as_str()]),
        AlertHandler::Email(h) => {
            calls.flag(name, true);
            calls.list("to", &h.to);
        }
        AlertHandler::Exec(h) => calls.call(name, h.command.iter().map(String::as_str)),
        AlertHandler::Log(h) => calls.call(name, [h.file_path.as_str()]),
        AlertHandler::VictorOps(h) => {
            calls.flag(name, true);
            calls.string("routingKey", &h.routing_key);
        }
        AlertHandler::PagerDuty(h) => {
            calls.flag(name, true);
            calls.string("serviceKey", &h.service_key);
        }
        AlertHandler::PagerDuty2(h) => {
            calls.flag(name, true);
            calls.string("routingKey", &h.routing_key);
        }
        AlertHandler::Pushover(h) => {
            calls.flag(name, true);
            calls.string("userKey", &h.user_key);
            calls.string("device", &h.device);
            calls.string("title", &h.title);
            calls.string("url", &h.url);
            calls.string("urlTitle", &h.url_title);
            calls.string("sound", &h.sound);
        }
        AlertHandler::Sensu(h) => {
            calls.flag(name, true);
            calls.string("source", &h.source);
            calls.list("handlers", &h.handlers);
        }
        AlertHandler::Slack(h) => {
            calls.flag(name, true);
            calls.string("channel", &h.channel);
            calls.string("username", &h.username);
            calls.string("iconEmoji", &h.icon_emoji);
            calls.string("workspace", &h.workspace);
        }
        AlertHandler::Telegram(h) => {
            calls.flag(name, true);
            calls.string("chatId", &h.chat_id);
            calls.string("parseMode", &h.parse_mode);
            calls.flag("disableWebPagePreview", h.disable_web_page_preview);
            calls.flag("disableNotification", h.disable_notification);
        }
        AlertHandler::HipChat(h) => {
            calls.flag(name, true);
            calls.string("room", &h.room);
            calls.string("token", &h.token);
        }
        AlertHandler::Alerta(h) => {
            calls.flag(name, true);
            calls.string("token", &h.token);
            calls.string("resource", &h.resource);
            calls.string("event", &h.event);
            calls.string("environment", &h.environment);
            calls.string("group", &h.group);
            calls.string("value", &h.value);
            calls.string("origin", &h.origin);
            calls.list("services", &h.services);
        }
        AlertHandler::OpsGenie(h) | AlertHandler::OpsGenie2(h) => {
            calls.flag(name, true);
            calls.list("teams", &h.teams);
            calls.list("recipients", &h.recipients);
        }
        AlertHandler::Talk(_) => calls.flag(name, true),
        AlertHandler::Kafka(h) => {
            calls.flag(name, true);
            calls.string("cluster", &h.cluster);
            calls.string("kafkaTopic", &h.topic);
            calls.string("template", &h.template);
        }
    }
}

// Property calls of a chain, one per line.
#[derive(Default)]
struct Calls(String);

impl Calls {
    fn call<'a>(&mut self, method: &str, args: impl IntoIterator<Item = &'a str>) {
        self.0.push_str(&format!(
            "        .{method}({})\n",
            args.into_iter().map(quote).join(", ")
        ));
    }

    fn flag(&mut self, method: &str, set: bool) {
        if set {
            self.call(method, []);
        }
    }

    fn string(&mut self, method: &str, value: &str) {
        if !value.is_empty() {
            self.call(method, [value]);
        }
    }

    fn list(&mut self, method: &str, values: &[String]) {
        if !values.is_empty() {
            self.call(method, values.iter().map(String::as_str));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use models::{AlertNodes, Email, Post, Slack, Telegram};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_service_calls() {
        let mut nodes: AlertNodes = [
            AlertHandler::Telegram(Telegram {
                chat_id: "42".to_string(),
                disable_notification: true,
                ..Default::default()
            }),
            AlertHandler::Slack(Slack {
                channel: "#alerts".to_string(),
                ..Default::default()
            }),
            AlertHandler::Email(Email {
                to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            }),
            AlertHandler::Post(Post {
                url: "http://example.com".to_string(),
                headers: [("Z".to_string(), "1".to_string()), ("A".to_string(), "it's".to_string())]
                    .into_iter()
                    .collect(),
            }),
        ]
        .into_iter()
        .collect();
        nodes.state_changes_only = true;

        let rule = AlertRule {
            alert_nodes: nodes,
            ..Default::default()
        };
        assert_eq!(
            alert_services(&rule, &Options::default()).unwrap(),
            r#"        .stateChangesOnly()
        .post('http://example.com')
        .header('A', 'it\'s')
        .header('Z', '1')
        .email()
        .to('a@example.com', 'b@example.com')
        .slack()
        .channel('#alerts')
        .telegram()
        .chatId('42')
        .disableNotification()
"#
        );
    }
}
