use proptest::prelude::*;
use taiko_play::{
    AutoPlayer, BalloonRule, Crown, GaugeConfig, InputEvent, InputLog, JudgmentSession,
    ManualClock, NoteState, Outcome, PlayConfig, PlaybackClock, Quality, ScoreConfig, ScoreMode,
    replay, run_autoplay, shinuchi_note_points, start_session,
};
use tja_model::{BranchKind, Difficulty, Timeline, build_timeline, load_chart};

fn timeline(header: &str, body: &str) -> Timeline {
    let text = format!(
        "TITLE:t\nBPM:120\nCOURSE:Oni\n{}\n#START\n{}\n#END\n",
        header, body
    );
    let chart = load_chart(&text).unwrap();
    let course = chart.course(Difficulty::Oni).unwrap();
    build_timeline(&chart.song, course, None).unwrap()
}

fn healthy() -> PlayConfig {
    PlayConfig {
        gauge: GaugeConfig {
            init: 90.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_exact_hit_is_great() {
    let tl = timeline("", "1,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let result = session.handle_input(InputEvent::don(0.0)).unwrap();
    assert_eq!(result.outcome, Outcome::Hit(Quality::Great));
    assert_eq!(result.score_delta, 300);
    assert_eq!(result.combo, 1);
    assert!((result.gauge - 51.0).abs() < 1e-9);
    assert!(session.is_finished());
}

#[test]
fn test_last_hit_completes_session() {
    let tl = timeline("", "1,");
    let mut session = start_session(&tl, &healthy());
    session.handle_input(InputEvent::don(0.0)).unwrap();
    assert_eq!(session.cursor(), tl.notes().len());
    assert!(session.is_finished());

    let summary = session.summary();
    assert!(summary.complete);
    assert!(summary.cleared);
    assert_eq!(summary.crown, Crown::AllGreat);
}

#[test]
fn test_window_edges_inclusive() {
    let tl = timeline("", "1000,\n1000,\n1000,\n1000,");
    let mut session = start_session(&tl, &PlayConfig::default());

    let great = session.handle_input(InputEvent::don(0.025)).unwrap();
    assert_eq!(great.outcome, Outcome::Hit(Quality::Great));

    let good = session.handle_input(InputEvent::don(2.050)).unwrap();
    assert_eq!(good.outcome, Outcome::Hit(Quality::Good));

    let bad = session.handle_input(InputEvent::don(4.100)).unwrap();
    assert_eq!(bad.outcome, Outcome::Hit(Quality::Bad));

    assert_eq!(session.handle_input(InputEvent::don(6.1001)), None);
    let missed = session.advance(7.0);
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].outcome, Outcome::Missed);
    assert!((missed[0].time - 6.1).abs() < 1e-9);
}

#[test]
fn test_thirty_ms_late_is_good() {
    let tl = timeline("", "1,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let result = session.handle_input(InputEvent::don(0.030)).unwrap();
    assert_eq!(result.outcome, Outcome::Hit(Quality::Good));
    assert_eq!(result.score_delta, 150);
    assert_eq!(result.combo, 1);
    assert_eq!(result.offset_ms, Some(30.0));
    assert_eq!(result.fast_slow, Some(taiko_play::FastSlow::Slow));
}

#[test]
fn test_combo_resets_only_on_miss() {
    let tl = timeline("", "1111,");
    let mut session = start_session(&tl, &PlayConfig::default());

    session.handle_input(InputEvent::don(0.0)).unwrap();
    let bad = session.handle_input(InputEvent::don(0.58)).unwrap();
    assert_eq!(bad.outcome, Outcome::Hit(Quality::Bad));
    assert_eq!(session.combo(), 1);

    let missed = session.advance(1.2);
    assert_eq!(missed.len(), 1);
    assert_eq!(session.combo(), 0);

    session.handle_input(InputEvent::don(1.5)).unwrap();
    assert_eq!(session.combo(), 1);
    assert_eq!(session.max_combo(), 1);
}

#[test]
fn test_score_tier_rises_every_ten_combo() {
    let tl = timeline("", "1111111111111111,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let deltas: Vec<i64> = (0..11)
        .map(|i| {
            session
                .handle_input(InputEvent::don(i as f64 * 0.125))
                .unwrap()
                .score_delta
        })
        .collect();
    assert!(deltas[..10].iter().all(|&d| d == 300));
    assert_eq!(deltas[10], 330);
}

#[test]
fn test_gogo_doubles_note_score() {
    let tl = timeline("", "#GOGOSTART\n1,\n#GOGOEND\n1,");
    let mut session = start_session(&tl, &PlayConfig::default());
    assert_eq!(
        session.handle_input(InputEvent::don(0.0)).unwrap().score_delta,
        600
    );
    assert_eq!(
        session.handle_input(InputEvent::don(2.0)).unwrap().score_delta,
        300
    );
}

#[test]
fn test_balloon_pops_exactly_at_required_hits() {
    let tl = timeline("BALLOON:3", "7008,");
    let mut session = start_session(&tl, &PlayConfig::default());

    assert_eq!(session.handle_input(InputEvent::katsu(0.0)), None);

    let outcomes: Vec<Outcome> = [0.0, 0.1, 0.2]
        .iter()
        .map(|&t| session.handle_input(InputEvent::don(t)).unwrap().outcome)
        .collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::RollHit { hits: 1 },
            Outcome::RollHit { hits: 2 },
            Outcome::BalloonPopped { hits: 3 },
        ]
    );
    assert_eq!(session.score(), 800);
    assert_eq!(session.note_state(0), Some(NoteState::Popped { hits: 3 }));
    assert_eq!(session.handle_input(InputEvent::don(0.3)), None);
    assert_eq!(session.counts().balloons_popped, 1);
}

#[test]
fn test_unpopped_balloon_rules() {
    let tl = timeline("BALLOON:3", "7008,");

    let mut partial = start_session(&tl, &PlayConfig::default());
    partial.handle_input(InputEvent::don(0.0));
    partial.handle_input(InputEvent::don(0.1));
    let results = partial.advance(2.0);
    assert_eq!(
        results[0].outcome,
        Outcome::BalloonUnpopped {
            hits: 2,
            required: 3
        }
    );
    assert_eq!(results[0].score_delta, 0);
    assert_eq!(partial.score(), 200);

    let forfeit_config = PlayConfig {
        balloon_rule: BalloonRule::Forfeit,
        ..Default::default()
    };
    let mut forfeit = start_session(&tl, &forfeit_config);
    forfeit.handle_input(InputEvent::don(0.0));
    forfeit.handle_input(InputEvent::don(0.1));
    let results = forfeit.advance(2.0);
    assert_eq!(results[0].score_delta, -200);
    assert_eq!(forfeit.score(), 0);
}

#[test]
fn test_drumroll_counts_hits_until_end() {
    let tl = timeline("", "5008,");
    let mut session = start_session(&tl, &PlayConfig::default());
    for i in 0..5 {
        let result = session.handle_input(InputEvent::katsu(i as f64 * 0.1)).unwrap();
        assert_eq!(result.outcome, Outcome::RollHit { hits: i + 1 });
        assert_eq!(result.score_delta, 100);
    }
    assert_eq!(session.handle_input(InputEvent::don(1.5)), None);
    let finished = session.advance(1.5);
    assert_eq!(finished[0].outcome, Outcome::RollFinished { hits: 5 });
    assert_eq!(session.combo(), 0);
    assert_eq!(session.counts().roll_hits, 5);
}

#[test]
fn test_five_misses_fail_once() {
    let tl = timeline("", "11111,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let results = session.advance(10.0);
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.outcome == Outcome::Missed));
    let failures: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.failed)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(failures, vec![4]);
    assert!(session.is_failed());
    assert!(session.gauge().abs() < 1e-9);

    let summary = session.summary();
    assert!(summary.failed);
    assert_eq!(summary.crown, Crown::None);
}

#[test]
fn test_tie_goes_to_earlier_note() {
    let tl = timeline("", "1100000000000000,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let result = session.handle_input(InputEvent::don(0.0625)).unwrap();
    assert_eq!(result.note_index, 0);
    assert_eq!(result.outcome, Outcome::Hit(Quality::Bad));
    assert_eq!(session.note_state(1), Some(NoteState::Pending));
}

#[test]
fn test_late_input_cannot_take_missed_note() {
    let tl = timeline("", "1010,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let missed = session.advance(0.15);
    assert_eq!(missed.len(), 1);
    assert_eq!(session.handle_input(InputEvent::don(0.09)), None);
    assert_eq!(session.note_state(1), Some(NoteState::Pending));
}

#[test]
fn test_feed_expires_before_judging() {
    let tl = timeline("", "1010,");
    let mut session = start_session(&tl, &PlayConfig::default());
    let results = session.feed(InputEvent::don(1.0));
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].outcome, Outcome::Missed);
    assert_eq!(results[1].outcome, Outcome::Hit(Quality::Great));
    assert_eq!(results[1].note_index, 1);
}

const BRANCHED: &str = "1111,\n1111,\n#BRANCHSTART p,50,90\n#N\n1,\n#E\n11,\n#M\n1111,\n#BRANCHEND\n1,";

#[test]
fn test_perfect_play_takes_master() {
    let tl = timeline("", BRANCHED);
    let mut session = start_session(&tl, &healthy());
    let mut player = AutoPlayer::new(&healthy());
    run_autoplay(&mut session, &mut player, 0.016);

    assert_eq!(session.section_path(0), Some(BranchKind::Master));
    let summary = session.summary();
    assert_eq!(summary.branches, vec![BranchKind::Master]);
    assert_eq!(summary.counts.great, 13);
    assert_eq!(summary.counts.miss, 0);
    assert!(summary.complete);
}

#[test]
fn test_partial_play_takes_expert_and_skips_other_paths() {
    let tl = timeline("", BRANCHED);
    let mut session = start_session(&tl, &PlayConfig::default());
    for t in [0.0, 0.5, 1.0] {
        session.feed(InputEvent::don(t));
    }
    session.advance(2.0);
    assert_eq!(session.section_path(0), Some(BranchKind::Expert));

    for (i, note) in tl.notes().iter().enumerate() {
        let state = session.note_state(i).unwrap();
        match note.branch {
            Some(BranchKind::Expert) | None => assert_ne!(state, NoteState::Skipped),
            Some(_) => assert_eq!(state, NoteState::Skipped),
        }
    }

    session.advance(10.0);
    assert!(session.is_finished());
    assert_eq!(session.counts().judged(), 4 + 4 + 2 + 1);
}

#[test]
fn test_no_input_stays_normal() {
    let tl = timeline("", BRANCHED);
    let mut session = start_session(&tl, &PlayConfig::default());
    session.advance(10.0);
    assert_eq!(session.summary().branches, vec![BranchKind::Normal]);
}

#[test]
fn test_level_hold_locks_branch() {
    let body = "1111,\n1111,\n\
                #BRANCHSTART p,50,90\n#N\n1111,\n#E\n1111,\n#M\n#LEVELHOLD\n1111,\n#BRANCHEND\n\
                #BRANCHSTART p,50,90\n#N\n1111,\n#E\n1111,\n#M\n1111,\n#BRANCHEND";
    let tl = timeline("", body);
    let mut session = start_session(&tl, &PlayConfig::default());
    for t in [0.0, 0.5, 1.0, 1.5] {
        session.feed(InputEvent::don(t));
    }
    session.advance(20.0);
    assert_eq!(
        session.summary().branches,
        vec![BranchKind::Master, BranchKind::Master]
    );
    assert_eq!(session.current_branch(), BranchKind::Master);
}

#[test]
fn test_section_resets_branch_metric() {
    // Reset at 2.0, decision at 4.0.
    let body = "1111,\n#SECTION\n1111,\n1111,\n#BRANCHSTART p,50,90\n#N\n1,\n#M\n2,\n#BRANCHEND";
    let tl = timeline("", body);
    assert_eq!(tl.section_resets(), &[2.0]);
    assert_eq!(tl.sections()[0].check_time, 4.0);

    let mut session = start_session(&tl, &PlayConfig::default());
    let missed = session.advance(1.9);
    assert_eq!(missed.len(), 4);
    for t in [2.0, 2.5, 3.0, 3.5] {
        session.feed(InputEvent::don(t));
    }
    assert_eq!(session.branch_stats().great, 4);
    assert_eq!(session.branch_stats().miss, 0);

    // 4 of 8 would only reach Expert without the reset.
    session.advance(10.0);
    assert_eq!(session.summary().branches, vec![BranchKind::Master]);
}

#[test]
fn test_reset_at_checkpoint_applies_after_decision() {
    let body = "1111,\n#SECTION\n1111,\n#BRANCHSTART p,50,90\n#N\n1,\n#M\n2,\n#BRANCHEND";
    let tl = timeline("", body);
    assert_eq!(tl.section_resets(), &[2.0]);
    assert_eq!(tl.sections()[0].check_time, 2.0);

    let mut session = start_session(&tl, &PlayConfig::default());
    for t in [0.0, 0.5, 1.0, 1.5] {
        session.feed(InputEvent::don(t));
    }
    session.advance(2.0);
    assert_eq!(session.section_path(0), Some(BranchKind::Master));
    assert_eq!(session.branch_stats().great, 0);

    session.advance(10.0);
    assert_eq!(session.summary().branches, vec![BranchKind::Master]);
    assert_eq!(session.branch_stats().miss, 5);
}

#[test]
fn test_advance_reports_in_time_order() {
    // Don at 0.0 misses at 0.1; the roll from 0.03125 ends at 0.0625.
    let body = format!("158{},", "0".repeat(61));
    let tl = timeline("", &body);
    let mut session = start_session(&tl, &PlayConfig::default());
    let results = session.advance(1.0);
    let outcomes: Vec<Outcome> = results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![Outcome::RollFinished { hits: 0 }, Outcome::Missed]
    );
    assert!(results.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn test_manual_clock_frames() {
    let tl = timeline("", "1212,");
    let mut session = start_session(&tl, &healthy());
    let clock = ManualClock::new(-0.1);
    let mut pending = vec![
        InputEvent::don(0.0),
        InputEvent::katsu(0.5),
        InputEvent::don(1.0),
        InputEvent::katsu(1.5),
    ]
    .into_iter()
    .peekable();

    let mut outcomes = Vec::new();
    while clock.now() < 2.0 {
        clock.advance(0.016);
        while let Some(event) = pending.next_if(|e| e.time <= clock.now()) {
            outcomes.extend(session.handle_input(event).map(|r| r.outcome));
        }
        outcomes.extend(session.advance_clock(&clock).iter().map(|r| r.outcome));
    }
    assert_eq!(outcomes, vec![Outcome::Hit(Quality::Great); 4]);
    assert!(session.is_finished());
}

#[test]
fn test_replay_log() {
    let tl = timeline("", "1111,");
    let log = InputLog::new(vec![
        InputEvent::don(0.0),
        InputEvent::don(0.54),
        InputEvent::don(1.5),
    ])
    .unwrap();
    let mut session = start_session(&tl, &PlayConfig::default());
    let results = replay(&mut session, &log, 0.016);
    let outcomes: Vec<Outcome> = results.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Hit(Quality::Great),
            Outcome::Hit(Quality::Good),
            Outcome::Missed,
            Outcome::Hit(Quality::Great),
        ]
    );
    assert!(session.summary().complete);
}

#[test]
fn test_replay_stops_at_chart_end() {
    let tl = timeline("", "1,");
    let log = InputLog::new(vec![InputEvent::don(-1e9), InputEvent::don(0.0), InputEvent::don(1e9)])
        .unwrap();
    let mut session = start_session(&tl, &healthy());
    let results = replay(&mut session, &log, 0.016);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, Outcome::Hit(Quality::Great));
    assert_eq!(session.summary().crown, Crown::AllGreat);
}

#[test]
fn test_shinuchi_note_value() {
    let tl = timeline("BALLOON:4", "1111,\n7008,");
    // Balloon keeps 100 aside, 999900 over four notes rounds up to 249980.
    assert_eq!(shinuchi_note_points(&tl), 249_980);

    let config = PlayConfig {
        score: ScoreConfig {
            mode: ScoreMode::ShinUchi,
            ..Default::default()
        },
        ..healthy()
    };
    let mut session = start_session(&tl, &config);
    let great = session.feed(InputEvent::don(0.0));
    assert_eq!(great[0].score_delta, 249_980);
    let good = session.feed(InputEvent::don(0.54));
    assert_eq!(good[0].outcome, Outcome::Hit(Quality::Good));
    assert_eq!(good[0].score_delta, 249_980);

    for t in [2.0, 2.1, 2.2, 2.3] {
        let result = session.feed(InputEvent::don(t));
        assert_eq!(result.last().unwrap().score_delta, 100);
    }
    assert_eq!(session.counts().balloons_popped, 1);
    session.advance(10.0);
    assert_eq!(session.score(), 2 * 249_980 + 400);
}

#[test]
fn test_shinuchi_drumroll_pays_per_ten_hits() {
    let tl = timeline("", "5008,");
    let config = PlayConfig {
        score: ScoreConfig {
            mode: ScoreMode::ShinUchi,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut session = start_session(&tl, &config);
    let deltas: Vec<i64> = (0..12)
        .map(|i| {
            session
                .handle_input(InputEvent::don(i as f64 * 0.1))
                .unwrap()
                .score_delta
        })
        .collect();
    assert_eq!(deltas[0], 1000);
    assert_eq!(deltas[10], 1000);
    assert_eq!(deltas.iter().sum::<i64>(), 2000);
}

#[test]
fn test_autoplay_inputs_replay_the_same() {
    let tl = timeline("BALLOON:4", "1234,\n7008,\n1122,");
    let config = healthy();
    let mut session = start_session(&tl, &config);
    let inputs = run_autoplay(&mut session, &mut AutoPlayer::new(&config), 0.016);
    assert!(!inputs.is_empty());

    let log = InputLog::new(inputs).unwrap();
    let mut again = start_session(&tl, &config);
    replay(&mut again, &log, 0.016);
    assert_eq!(again.summary(), session.summary());
}

#[test]
fn test_autoplay_all_great() {
    let body = "1234,\n5000000800000000,\n7008,\n#GOGOSTART\n1122,\n#GOGOEND\n6008,";
    let tl = timeline("BALLOON:4", body);
    let config = healthy();
    let mut session = JudgmentSession::new(&tl, &config);
    let mut player = AutoPlayer::new(&config);
    run_autoplay(&mut session, &mut player, 0.016);

    let summary = session.summary();
    assert_eq!(summary.counts.great, 8);
    assert_eq!(summary.counts.miss, 0);
    assert_eq!(summary.counts.balloons_popped, 1);
    assert!(summary.counts.roll_hits > 4);
    assert_eq!(summary.max_combo, 8);
    assert!(summary.complete);
    assert_eq!(summary.crown, Crown::AllGreat);
}

#[test]
fn test_autoplay_respects_judge_offset() {
    let config = PlayConfig {
        judge_offset_ms: 35.0,
        ..healthy()
    };
    let tl = timeline("", "1212,");
    let mut session = start_session(&tl, &config);
    let mut player = AutoPlayer::new(&config);
    run_autoplay(&mut session, &mut player, 0.016);
    assert_eq!(session.counts().great, 4);
}

proptest! {
    #[test]
    fn prop_every_note_resolves_once(offsets in proptest::collection::vec(-0.2f64..0.2, 8)) {
        let tl = timeline("", "1111,\n1111,");
        let mut session = start_session(&tl, &PlayConfig::default());
        let mut resolved = 0;
        for (i, offset) in offsets.iter().enumerate() {
            let event = InputEvent::don(i as f64 * 0.5 + offset);
            resolved += session
                .feed(event)
                .iter()
                .filter(|r| matches!(r.outcome, Outcome::Hit(_) | Outcome::Missed))
                .count();
            prop_assert!(session.combo() <= session.max_combo());
        }
        resolved += session.advance(10.0).len();
        prop_assert_eq!(resolved, 8);
        prop_assert_eq!(session.counts().judged(), 8);
        prop_assert!(session.is_finished());
    }
}
