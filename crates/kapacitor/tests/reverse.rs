use std::collections::BTreeMap;

use kapacitor::{generate, reverse, targeted_reverse, Error, Generator, Options};
use models::{
    AlertHandler, AlertNodes, AlertRule, Alerta, Change, Email, Exec, Field, GroupBy, HipChat,
    Kafka, Log, OpsGenie, PagerDuty, PagerDuty2, Post, Pushover, QueryConfig, Sensu, Slack, Talk,
    Tcp, Telegram, TriggerKind, TriggerValues, VictorOps, DBRP,
};
use pretty_assertions::assert_eq;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn query() -> QueryConfig {
    QueryConfig {
        database: "telegraf".to_string(),
        retention_policy: "autogen".to_string(),
        measurement: "cpu".to_string(),
        fields: vec![Field::field("usage_user")],
        ..Default::default()
    }
}

fn windowed_query() -> QueryConfig {
    let mut query = query();
    query.fields = vec![Field::func("mean", vec![Field::field("usage_user")])];
    query.group_by = GroupBy {
        time: "5m".to_string(),
        tags: strings(&["host"]),
    };
    query.tags = BTreeMap::from([
        ("cpu".to_string(), strings(&["cpu-total"])),
        ("host".to_string(), strings(&["a", "b"])),
    ]);
    query.are_tags_accepted = true;
    query
}

fn threshold(operator: models::Operator, value: &str, range_value: &str) -> AlertRule {
    AlertRule {
        name: "cpu alert".to_string(),
        trigger: TriggerKind::Threshold,
        trigger_values: TriggerValues {
            operator: Some(operator),
            value: value.to_string(),
            range_value: range_value.to_string(),
            ..Default::default()
        },
        message: "{{ .ID }} is {{ .Level }}".to_string(),
        query: Some(query()),
        ..Default::default()
    }
}

// Generate the script of `rule`, and check that it reverses back into
// `rule` itself plus the script and its database.
fn round_trip(rule: AlertRule) {
    let script = generate(&rule).unwrap();
    let recovered = reverse(&script).unwrap();

    let query = rule.query.as_ref().unwrap();
    let dbrps = vec![DBRP {
        db: query.database.clone(),
        rp: query.retention_policy.clone(),
    }];
    let expect = AlertRule {
        dbrps,
        tick_script: script,
        ..rule
    };
    assert_eq!(recovered, expect);
}

#[test]
fn test_every_operator_round_trips() {
    for operator in models::Operator::all() {
        let rule = if operator.is_range() {
            threshold(*operator, "10", "20.5")
        } else {
            threshold(*operator, "-1.5", "")
        };
        round_trip(rule);
    }
}

#[test]
fn test_string_crit_round_trips() {
    round_trip(threshold(models::Operator::Equal, "it's down", ""));
    round_trip(threshold(models::Operator::NotEqual, "TRUE", ""));
    // Wider than an i64, so it's kept as a string.
    round_trip(threshold(models::Operator::Greater, "99999999999999999999", ""));
}

#[test]
fn test_numeric_crits_are_canonicalized() {
    for (value, canonical) in [("1.50", "1.5"), ("007", "7"), ("-0.250", "-0.25"), ("1.0", "1.0")] {
        let rule = threshold(models::Operator::Greater, value, "");
        let recovered = reverse(&generate(&rule).unwrap()).unwrap();
        assert_eq!(recovered.trigger_values.value, canonical, "{value}");
    }
}

#[test]
fn test_tag_values_with_newlines_round_trip() {
    let converted = influxql::convert(
        r#"SELECT "usage_user" FROM "telegraf"."autogen"."cpu" WHERE "host" = 'a\nb'"#,
    )
    .unwrap();
    assert_eq!(converted.tags["host"], strings(&["a\nb"]));

    let mut rule = threshold(models::Operator::Greater, "90", "");
    let query = rule.query.as_mut().unwrap();
    query.tags = converted.tags;
    query.are_tags_accepted = converted.are_tags_accepted;
    round_trip(rule);
}

#[test]
fn test_windowed_rule_round_trips() {
    let mut rule = threshold(models::Operator::Greater, "90", "");
    rule.every = "1m".to_string();
    rule.details = "<b>{{ .ID }}</b>\nis high".to_string();
    rule.query = Some(windowed_query());
    round_trip(rule.clone());

    let query = rule.query.as_mut().unwrap();
    query.are_tags_accepted = false;
    query.fields = vec![Field::func(
        "top",
        vec![Field::field("usage_user"), Field::integer("3")],
    )];
    round_trip(rule.clone());

    rule.query.as_mut().unwrap().fields = vec![Field::func(
        "percentile",
        vec![Field::field("usage_user"), Field::number("99.5")],
    )];
    round_trip(rule);
}

#[test]
fn test_relative_rules_round_trip() {
    for change in [Change::Percent, Change::Amount] {
        let mut rule = threshold(models::Operator::GreaterEqual, "5", "");
        rule.trigger = TriggerKind::Relative;
        rule.trigger_values.change = Some(change);
        rule.trigger_values.shift = "1h".to_string();
        round_trip(rule.clone());

        rule.every = "30s".to_string();
        rule.query = Some(windowed_query());
        round_trip(rule);
    }
}

#[test]
fn test_deadman_rule_round_trips() {
    let mut rule = threshold(models::Operator::Greater, "", "");
    rule.trigger = TriggerKind::Deadman;
    rule.trigger_values = TriggerValues {
        period: "10m".to_string(),
        ..Default::default()
    };
    let mut query = query();
    query.fields.clear();
    rule.query = Some(query);
    round_trip(rule);
}

#[test]
fn test_every_service_round_trips() {
    let handlers = vec![
        AlertHandler::Post(Post {
            url: "http://example.com/alert".to_string(),
            headers: BTreeMap::from([("Authorization".to_string(), "Bearer x".to_string())]),
        }),
        AlertHandler::Post(Post::default()),
        AlertHandler::Tcp(Tcp {
            address: "example.com:9000".to_string(),
        }),
        AlertHandler::Email(Email {
            to: strings(&["a@example.com", "b@example.com"]),
        }),
        AlertHandler::Exec(Exec {
            command: strings(&["/bin/notify", "--loud"]),
        }),
        AlertHandler::Log(Log {
            file_path: "/tmp/alerts.log".to_string(),
        }),
        AlertHandler::VictorOps(VictorOps {
            routing_key: "ops".to_string(),
        }),
        AlertHandler::PagerDuty(PagerDuty {
            service_key: "pd".to_string(),
        }),
        AlertHandler::PagerDuty2(PagerDuty2 {
            routing_key: "pd2".to_string(),
        }),
        AlertHandler::Pushover(Pushover {
            user_key: "user".to_string(),
            device: "phone".to_string(),
            title: "title".to_string(),
            url: "http://example.com".to_string(),
            url_title: "link".to_string(),
            sound: "siren".to_string(),
        }),
        AlertHandler::Sensu(Sensu {
            source: "kapacitor".to_string(),
            handlers: strings(&["a", "b"]),
        }),
        AlertHandler::Slack(Slack {
            channel: "#alerts".to_string(),
            username: "kapacitor".to_string(),
            icon_emoji: ":fire:".to_string(),
            workspace: "ops".to_string(),
        }),
        AlertHandler::Slack(Slack {
            channel: "#other".to_string(),
            ..Default::default()
        }),
        AlertHandler::Telegram(Telegram {
            chat_id: "42".to_string(),
            parse_mode: "Markdown".to_string(),
            disable_web_page_preview: true,
            disable_notification: false,
        }),
        AlertHandler::HipChat(HipChat {
            room: "ops".to_string(),
            token: "secret".to_string(),
        }),
        AlertHandler::Alerta(Alerta {
            token: "t".to_string(),
            resource: "r".to_string(),
            event: "e".to_string(),
            environment: "prod".to_string(),
            group: "g".to_string(),
            value: "v".to_string(),
            origin: "o".to_string(),
            services: strings(&["s1", "s2"]),
        }),
        AlertHandler::OpsGenie(OpsGenie {
            teams: strings(&["t1"]),
            recipients: strings(&["r1", "r2"]),
        }),
        AlertHandler::OpsGenie2(OpsGenie {
            teams: strings(&["t2"]),
            recipients: Vec::new(),
        }),
        AlertHandler::Talk(Talk {}),
        AlertHandler::Kafka(Kafka {
            cluster: "main".to_string(),
            topic: "alerts".to_string(),
            template: "tmpl".to_string(),
        }),
    ];
    let mut nodes: AlertNodes = handlers.into_iter().collect();
    nodes.state_changes_only = true;

    let mut rule = threshold(models::Operator::Greater, "90", "");
    rule.alert_nodes = nodes;
    round_trip(rule);
}

#[test]
fn test_foreign_scripts_are_rejected() {
    assert!(matches!(
        reverse("stream\n    |from()\n        .measurement('cpu')\n    |alert()\n"),
        Err(Error::NotChronoTickscript(_))
    ));
    assert!(matches!(reverse("var x = 'open"), Err(Error::Parse(_))));

    let script = generate(&threshold(models::Operator::Greater, "90", "")).unwrap();
    let edited = script.replace(
        "        .durationField(durationField)\n",
        "        .durationField(durationField)\n        .flowdock()\n",
    );
    assert!(matches!(
        reverse(&edited),
        Err(Error::UnknownServiceMethod(m)) if m == "flowdock"
    ));

    let edited = script.replace("    |eval(lambda: \"usage_user\")", "    |eval(lambda: \"usage_user\" * 2)");
    assert!(matches!(reverse(&edited), Err(Error::UnsupportedChain(s)) if s == "eval"));

    let edited = script.replace(
        "var triggerType = 'threshold'",
        "var triggerType = 'deadman'",
    );
    assert!(matches!(reverse(&edited), Err(Error::UnsupportedChain(_))));

    let edited = script.replace("        .where(whereFilter)\n", "        .where(whereFilter)\n        .truncate(1s)\n");
    assert!(matches!(
        reverse(&edited),
        Err(Error::UnsupportedChain(s)) if s == "from.truncate"
    ));
}

#[test]
fn test_script_size_limit() {
    let script = generate(&threshold(models::Operator::Greater, "90", "")).unwrap();
    let generator = Generator::new(Options {
        max_script_bytes: 64,
        ..Default::default()
    });
    assert!(matches!(
        generator.reverse(&script),
        Err(Error::ScriptTooLarge { limit: 64, .. })
    ));
}

#[test]
fn test_nesting_limit() {
    let script = format!("var x = {}1{}", "(".repeat(50_000), ")".repeat(50_000));
    assert!(matches!(
        reverse(&script),
        Err(Error::Parse(tickscript::Error::TooDeep {
            limit: tickscript::MAX_DEPTH,
            line: 1
        }))
    ));
}

#[test]
fn test_targeted_reverse_names() {
    let script = generate(&threshold(models::Operator::Greater, "90", "")).unwrap();
    let script = format!("// chronograf-rule: cpu-high\n{script}");

    let rule = targeted_reverse(&script, r"chronograf-rule: (?P<name>[\w-]+)").unwrap();
    assert_eq!(rule.name, "cpu-high");
    assert_eq!(rule.trigger, TriggerKind::Threshold);

    let rule = targeted_reverse(&script, "no such rule").unwrap();
    assert_eq!(rule.name, "cpu alert");

    assert!(matches!(
        targeted_reverse(&script, "(unclosed"),
        Err(Error::InvalidNamePattern(_))
    ));
}
