//! Conversation-level tests driving `Puppeteer::react` over several turns.
//!
//! Every agenda is scripted: each message observation advances its script by
//! one entry, so the progress, terminal and kickoff signals of every turn are
//! spelled out in the test.

use std::fs;
use std::thread;

use puppeteer::io::turn_record::{read_turn_record, write_turn_record};
use puppeteer::test_support::{ScriptedAgenda, ScriptedState, ScriptedTurn, action};
use puppeteer::io::config::{PuppeteerConfig, load_config};
use puppeteer::{
    Agenda, ConfigurationError, Extractions, Handoff, Observation, Puppeteer, PuppeteerError,
    PuppeteerPolicy,
};

fn say(text: &str) -> Vec<Observation> {
    vec![Observation::message(text)]
}

fn scripted_state<'p>(puppeteer: &'p Puppeteer, name: &str) -> &'p ScriptedState {
    puppeteer
        .states()
        .get(name)
        .and_then(|state| state.as_any().downcast_ref::<ScriptedState>())
        .expect("scripted state")
}

/// Agenda `a` stalls right after starting; `b` may start but must wait.
///
/// ```text
/// turn 1: a kicked off (a1)           a idle 0
/// turn 2: a stalls                    a idle 1
/// turn 3: a stalls, b starts (b1)     a idle 2, b idle 0
/// turn 4: b progresses (b2)           a idle 3, b idle 0
/// ```
#[test]
fn stalled_agenda_yields_to_sibling() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff().action("a1"))
            .build(),
        ScriptedAgenda::new("b")
            .turn(ScriptedTurn::new().kickoff())
            .turn(ScriptedTurn::new())
            .turn(ScriptedTurn::new().action("b1"))
            .turn(ScriptedTurn::new().progress().action("b2"))
            .build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    let (actions, _) = puppeteer.react(&say("hello"), &prior).expect("turn 1");
    assert_eq!(actions, vec![action("a1")]);
    assert_eq!(puppeteer.active_agenda_names(), ["a", "b"]);

    let (actions, _) = puppeteer.react(&say("hm"), &prior).expect("turn 2");
    assert!(actions.is_empty());

    let (actions, _) = puppeteer.react(&say("so"), &prior).expect("turn 3");
    assert_eq!(actions, vec![action("b1")]);
    assert!(
        puppeteer
            .log()
            .contains("Each of kicked-off agendas has been idle for 2 consecutive turns or more.")
    );

    let (actions, _) = puppeteer.react(&say("ok"), &prior).expect("turn 4");
    assert_eq!(actions, vec![action("b2")]);

    let idle: Vec<(String, Option<u32>)> = puppeteer
        .active_states()
        .into_iter()
        .map(|snapshot| (snapshot.name, snapshot.idle_turns))
        .collect();
    assert_eq!(
        idle,
        vec![("a".to_string(), Some(3)), ("b".to_string(), Some(0))]
    );
    assert_eq!(puppeteer.turn(), 4);
}

#[test]
fn zero_threshold_config_is_refused_before_any_turn() {
    let config = PuppeteerConfig {
        idle_turns_before_fallback: 0,
        record_dir: None,
    };
    let agendas = vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff().action("a1"))
            .build(),
        ScriptedAgenda::new("b")
            .turn(ScriptedTurn::new().kickoff().action("b1"))
            .build(),
    ];

    let err = Puppeteer::from_config(agendas.clone(), &config).expect_err("zero threshold");
    assert!(err.is_configuration());

    let config = PuppeteerConfig {
        idle_turns_before_fallback: 1,
        ..config
    };
    let mut puppeteer = Puppeteer::from_config(agendas, &config).expect("puppeteer");
    let (actions, _) = puppeteer.react(&say("hi"), &Extractions::new()).expect("turn 1");
    assert_eq!(actions, vec![action("a1")]);
}

#[test]
fn handoff_replays_trigger_and_starts_target() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("greet")
            .turn(ScriptedTurn::new().kickoff().action("hello"))
            .turn(
                ScriptedTurn::new()
                    .action("thanks")
                    .handoff("payment", "pay_bill"),
            )
            .build(),
        ScriptedAgenda::new("payment")
            .kickoff_on("pay_bill")
            .turn(ScriptedTurn::new())
            .turn(ScriptedTurn::new().action("ask_amount"))
            .build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    puppeteer.react(&say("hi"), &prior).expect("turn 1");
    assert_eq!(puppeteer.active_agenda_names(), ["greet"]);

    let (actions, facts) = puppeteer.react(&say("I want to pay"), &prior).expect("turn 2");

    assert_eq!(actions, vec![action("thanks"), action("ask_amount")]);
    assert_eq!(facts.handoff(), &Handoff::kickoff("payment", "pay_bill"));
    let ledger = puppeteer.policy().ledger();
    assert_eq!(ledger.kicked_off_names(), ["greet", "payment"]);
    assert_eq!(ledger.record("payment").expect("payment").times_used, 1);
    assert_eq!(ledger.idle_turns("payment"), Some(0));
    assert_eq!(ledger.idle_turns("greet"), Some(1));
}

#[test]
fn unreachable_handoff_aborts_turn_and_keeps_previous_actions() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("c")
            .turn(ScriptedTurn::new().kickoff().action("c1"))
            .turn(ScriptedTurn::new().action("c2").handoff("d", "payment"))
            .build(),
        ScriptedAgenda::new("d").build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    puppeteer.react(&say("hi"), &prior).expect("turn 1");
    let before = puppeteer.policy().ledger().clone();

    let err = puppeteer
        .react(&say("pay"), &prior)
        .expect_err("d never became active");

    assert!(matches!(
        err,
        PuppeteerError::Configuration(ConfigurationError::InactiveKickoffTarget { ref agenda })
            if agenda.as_str() == "d"
    ));
    assert_eq!(puppeteer.policy().ledger(), &before);
    assert_eq!(puppeteer.last_actions(), [action("c1")]);
    assert_eq!(puppeteer.turn(), 1);
    assert!(puppeteer.log().contains("Turn aborted"));
}

#[test]
fn finished_agenda_is_reset_and_never_revived() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff().action("a1"))
            .turn(ScriptedTurn::new().progress().done().action("bye"))
            .turn(ScriptedTurn::new().kickoff())
            .build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    puppeteer.react(&say("hi"), &prior).expect("turn 1");
    let (actions, _) = puppeteer.react(&say("done"), &prior).expect("turn 2");
    assert_eq!(actions, vec![action("bye")]);
    assert_eq!(scripted_state(&puppeteer, "a").resets(), 1);
    assert!(puppeteer.log().contains("a is in a terminal state, so it will be stopped."));

    let (actions, _) = puppeteer.react(&say("again"), &prior).expect("turn 3");
    assert!(actions.is_empty());
    assert!(puppeteer.active_agenda_names().is_empty());
    assert!(
        puppeteer
            .log()
            .contains("Act phase\n  No active agenda, will do nothing.\n")
    );
}

#[test]
fn failed_update_surfaces_and_turn_can_be_retried() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff().action("a1"))
            .turn(ScriptedTurn::new().fail_update("intent model offline"))
            .turn(ScriptedTurn::new().progress().action("a2"))
            .build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    puppeteer.react(&say("hi"), &prior).expect("turn 1");
    let err = puppeteer.react(&say("eh"), &prior).expect_err("update fails");
    assert!(matches!(
        err,
        PuppeteerError::Collaborator { ref agenda, operation: "update", .. } if agenda.as_str() == "a"
    ));
    assert_eq!(
        format!("{:#}", anyhow::Error::from(err)),
        "agenda 'a' failed during update: intent model offline"
    );

    let (actions, _) = puppeteer.react(&say("eh"), &prior).expect("retry");
    assert_eq!(actions, vec![action("a2")]);
    assert_eq!(puppeteer.turn(), 2);
    // The retried update still sees the actions of the last successful turn.
    assert_eq!(
        scripted_state(&puppeteer, "a").seen_actions().last(),
        Some(&vec![action("a1")])
    );
}

#[test]
fn beliefs_see_active_agendas_from_before_the_turn() {
    let mut puppeteer = Puppeteer::new(vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff())
            .build(),
        ScriptedAgenda::new("b").build(),
    ])
    .expect("puppeteer");
    let prior = Extractions::new();

    puppeteer.react(&say("one"), &prior).expect("turn 1");
    puppeteer.react(&say("two"), &prior).expect("turn 2");

    let seen = scripted_state(&puppeteer, "b").seen_active();
    assert_eq!(seen, [Vec::<String>::new(), vec!["a".to_string()]]);
}

#[test]
fn conversations_share_agendas_across_threads() {
    let agendas: Vec<Agenda> = vec![
        ScriptedAgenda::new("a")
            .turn(ScriptedTurn::new().kickoff().action("a1"))
            .turn(ScriptedTurn::new().progress().action("a2"))
            .build(),
        ScriptedAgenda::new("b")
            .turn(ScriptedTurn::new().kickoff().action("b1"))
            .build(),
    ];

    let transcripts: Vec<Vec<Vec<String>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let agendas = agendas.clone();
                scope.spawn(move || {
                    let mut puppeteer = Puppeteer::new(agendas).expect("puppeteer");
                    (0..3)
                        .map(|turn| {
                            let (actions, _) = puppeteer
                                .react(&say(&format!("turn {}", turn)), &Extractions::new())
                                .expect("turn");
                            actions
                                .into_iter()
                                .map(|a| a.name)
                                .collect::<Vec<String>>()
                        })
                        .collect::<Vec<Vec<String>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect()
    });

    let expected = vec![
        vec!["a1".to_string()],
        vec!["a2".to_string()],
        Vec::new(),
    ];
    for transcript in transcripts {
        assert_eq!(transcript, expected);
    }
}

#[test]
fn configured_threshold_and_turn_records_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let records = temp.path().join("records");
    let config_path = temp.path().join("puppeteer.toml");
    fs::write(
        &config_path,
        format!(
            "idle_turns_before_fallback = 1\nrecord_dir = \"{}\"\n",
            records.display()
        ),
    )
    .expect("write config");
    let config = load_config(&config_path).expect("load config");

    let mut puppeteer = Puppeteer::from_config(
        vec![
            ScriptedAgenda::new("a")
                .turn(ScriptedTurn::new().kickoff())
                .build(),
            ScriptedAgenda::new("b")
                .turn(ScriptedTurn::new().kickoff())
                .turn(ScriptedTurn::new().fact("zip", "0150").action("b1"))
                .build(),
        ],
        &config,
    )
    .expect("puppeteer");

    puppeteer.react(&say("hi"), &Extractions::new()).expect("turn 1");
    let observations = say("my zip is 0150");
    let (actions, facts) = puppeteer
        .react(&observations, &Extractions::new())
        .expect("turn 2");
    assert_eq!(actions, vec![action("b1")]);

    let record_dir = config.record_dir.as_deref().expect("record dir");
    let path = write_turn_record(
        record_dir,
        &puppeteer.turn_record("conv-7", &observations, &facts),
    )
    .expect("write record");
    assert!(path.ends_with("conv-7/2.json"));

    let record = read_turn_record(&path).expect("read record");
    assert_eq!(record.turn, 2);
    assert_eq!(record.actions, vec![action("b1")]);
    assert_eq!(record.observations, observations);
    assert_eq!(record.extractions.get("zip"), Some(&serde_json::json!("0150")));
    assert_eq!(
        record
            .agendas
            .iter()
            .map(|agenda| (agenda.name.as_str(), agenda.times_used))
            .collect::<Vec<_>>(),
        vec![("a", 1), ("b", 1)]
    );
    assert_eq!(record.log, puppeteer.log_record());
}
