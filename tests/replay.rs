use pretty_assertions::assert_eq;
use synheart_interaction::sink::{CsvFileSink, NdjsonSink, DEFAULT_EXPORT_FILE};
use synheart_interaction::{
    parse_table, serialize, EngineConfig, FeatureVector, InteractionError, OutputSink, RawEvent,
    RawEventAdapter, ReplayProcessor, Session,
};

fn recorded_session() -> Vec<RawEvent> {
    vec![
        RawEvent::pointer_move(0.0, 0.0, 0.0),
        RawEvent::pointer_move(100.0, 10.0, 0.0),
        RawEvent::pointer_move(200.0, 20.0, 0.0),
        RawEvent::click(250.0),
        RawEvent::focus_in(300.0, false).with_target_tag("TEXTAREA"),
        RawEvent::key_down(400.0, "KeyO", "o"),
        RawEvent::key_up(500.0, "KeyO", "o"),
        RawEvent::key_down(600.0, "KeyK", "k"),
        RawEvent::key_up(750.0, "KeyK", "k"),
        RawEvent::key_down(900.0, "Period", "."),
        RawEvent::key_up(1_020.0, "Period", "."),
        RawEvent::focus_out(1_300.0, false).with_target_tag("TEXTAREA"),
        RawEvent::scroll(1_400.0, 240.0),
        RawEvent::scroll(1_500.0, 120.0),
    ]
}

#[test]
fn replay_recorded_session() {
    let mut events = recorded_session();
    // Editability comes from the tag, not the explicit flag
    for event in &mut events {
        event.target_is_editable = None;
    }

    let report = ReplayProcessor::new()
        .replay(&events, "123412341234")
        .unwrap();
    let features = report.features;

    assert_eq!(features.user_id, "123412341234");
    assert_eq!(features.avg_cursor_speed, 50.0);
    assert_eq!(features.click_pattern, 1);
    assert_eq!(features.key_press_duration, 123.33);
    assert_eq!(features.error_rate, 0.0);
    assert_eq!(features.typing_accuracy, 100.0);
    assert_eq!(features.key_transition_time, 250.0);
    assert_eq!(features.key_transition_std_dev, 50.0);
    assert_eq!(features.average_dwell_time, 1_000.0);
    assert_eq!(features.scroll_behavior, 360.0);
    assert_eq!(features.session_duration, 1.5);
    assert_eq!(report.diagnostics.accepted_events, 14);
}

#[test]
fn empty_session_is_all_defaults() {
    let mut session = Session::new("", &EngineConfig::default(), 0.0);
    let features = session.finalize(0.0).unwrap();
    assert_eq!(features, FeatureVector::empty("anonymous-user"));
}

#[test]
fn merged_device_streams_replay_in_order() {
    let mouse = vec![
        RawEvent::pointer_move(0.0, 0.0, 0.0).with_device("mouse"),
        RawEvent::pointer_move(100.0, 10.0, 0.0).with_device("mouse"),
    ];
    let keyboard = vec![
        RawEvent::focus_in(50.0, true).with_device("keyboard"),
        RawEvent::key_down(60.0, "KeyA", "a").with_device("keyboard"),
        RawEvent::key_up(160.0, "KeyA", "a").with_device("keyboard"),
    ];

    // Unmerged, the keyboard stream goes backwards in time
    let mut naive = mouse.clone();
    naive.extend(keyboard.clone());
    let unmerged = ReplayProcessor::new().replay(&naive, "u").unwrap();
    assert_eq!(unmerged.diagnostics.out_of_order_events, 2);

    let merged = RawEventAdapter::merge_streams(vec![mouse, keyboard]);
    let report = ReplayProcessor::new().replay(&merged, "u").unwrap();
    assert_eq!(report.diagnostics.out_of_order_events, 0);
    assert_eq!(report.features.key_press_duration, 100.0);
    assert_eq!(report.features.avg_cursor_speed, 50.0);
}

#[test]
fn merge_still_drops_a_stream_going_backwards() {
    let scrolls = vec![
        RawEvent::scroll(0.0, 0.0),
        RawEvent::scroll(300.0, 100.0),
        RawEvent::scroll(200.0, 1_000.0),
    ];

    let direct = ReplayProcessor::new().replay(&scrolls, "u").unwrap();
    let merged = RawEventAdapter::merge_streams(vec![scrolls]);
    let report = ReplayProcessor::new().replay(&merged, "u").unwrap();

    assert_eq!(report.diagnostics.out_of_order_events, 1);
    assert_eq!(report.features.scroll_behavior, 100.0);
    assert_eq!(report, direct);

    let clicks = vec![
        RawEvent::click(50.0).with_device("mouse"),
        RawEvent::click(40.0).with_device("mouse"),
    ];
    let merged = RawEventAdapter::merge_streams(vec![
        vec![
            RawEvent::scroll(0.0, 0.0),
            RawEvent::scroll(300.0, 100.0),
            RawEvent::scroll(200.0, 1_000.0),
        ],
        clicks,
    ]);
    let report = ReplayProcessor::new().replay(&merged, "u").unwrap();
    assert_eq!(report.diagnostics.out_of_order_events, 2);
    assert_eq!(report.features.click_pattern, 1);
}

#[test]
fn csv_export_round_trips() {
    let report = ReplayProcessor::new()
        .replay(&recorded_session(), "123412341234")
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut sink = CsvFileSink::in_dir(dir.path());
    let ack = sink.submit(&report.features).unwrap();
    assert!(ack.reference.unwrap().ends_with(DEFAULT_EXPORT_FILE));

    let written = std::fs::read_to_string(dir.path().join(DEFAULT_EXPORT_FILE)).unwrap();
    assert_eq!(written, serialize(&report.features).unwrap());
    assert_eq!(parse_table(&written).unwrap(), report.features);
}

#[test]
fn finalized_session_submits_to_ndjson_sink() {
    let mut session = Session::new("u", &EngineConfig::default(), 0.0);
    for event in recorded_session() {
        session.ingest(&event);
    }
    session.finalize(1_500.0).unwrap();

    let mut sink = NdjsonSink::new(Vec::new());
    session.submit(&mut sink).unwrap();
    // Retained vector can be delivered again
    session.submit(&mut sink).unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(output.lines().count(), 2);

    assert!(matches!(
        session.finalize(2_000.0),
        Err(InteractionError::AlreadyFinalized)
    ));
}
