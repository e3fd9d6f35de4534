use tja_model::{
    BranchKind, BranchMetric, Difficulty, FormatErrorKind, NoteKind, Segment, load_chart,
};

const SAMPLE: &str = "\
TITLE:Sample Song
SUBTITLE:--Composer
BPM:140
WAVE:sample.ogg
OFFSET:-0.5
GENRE:Namco Original

COURSE:Easy
LEVEL:3
BALLOON:4
#START
1000100010001000,
7008,
#END

COURSE:Oni
LEVEL:9
BALLOONNOR:10
BALLOONMAS:30
SCOREINIT:400
SCOREDIFF:100
#START
#GOGOSTART
3030303040404040,
#GOGOEND
#SECTION
#BRANCHSTART p,70,90
#N
7008,
#E
1111,
#M
7008,
#LEVELHOLD
2222,
#BRANCHEND
1,
#END
";

#[test]
fn test_sample_header() {
    let chart = load_chart(SAMPLE).unwrap();
    assert_eq!(chart.song.title, "Sample Song");
    assert_eq!(chart.song.subtitle, "Composer");
    assert!((chart.song.bpm - 140.0).abs() < 1e-9);
    assert!((chart.song.offset + 0.5).abs() < 1e-9);
    assert_eq!(chart.song.genre, "Namco Original");
    assert_eq!(chart.courses.len(), 2);
    assert!(chart.warnings.is_empty(), "{:?}", chart.warnings);
}

#[test]
fn test_sample_courses() {
    let chart = load_chart(SAMPLE).unwrap();

    let easy = chart.course(Difficulty::Easy).unwrap();
    assert_eq!(easy.level, 3);
    assert!(!easy.has_branches());
    let Segment::Measure(balloon) = &easy.segments[1] else {
        panic!("expected measure");
    };
    assert_eq!(balloon.notes[0], NoteKind::BalloonStart { required_hits: 4 });

    let oni = chart.course(Difficulty::Oni).unwrap();
    assert_eq!(oni.score_init, Some(400));
    assert_eq!(oni.score_diff, Some(100));
    assert!(oni.has_branches());

    let block = oni.branch_blocks().next().unwrap();
    assert_eq!(block.condition.metric, BranchMetric::Accuracy);
    let normal = block.path(BranchKind::Normal).unwrap();
    let master = block.path(BranchKind::Master).unwrap();
    assert_eq!(normal[0].notes[0], NoteKind::BalloonStart { required_hits: 10 });
    assert_eq!(master[0].notes[0], NoteKind::BalloonStart { required_hits: 30 });
    assert!(normal[0].section_reset);
    assert!(master[1].level_hold);
    assert!(block.has_level_hold(BranchKind::Master));
}

#[test]
fn test_fatal_errors_carry_line() {
    let err = load_chart("TITLE:x\nCOURSE:Oni\n#START\n1,\n1?,\n#END\n").unwrap_err();
    assert_eq!(err.kind, FormatErrorKind::UnknownToken('?'));
    assert_eq!(err.line, 5);
    assert_eq!(err.to_string(), "line 5: unrecognized note token '?'");
}

#[test]
fn test_irregular_lines_recovered() {
    let text = "TITLE:x\nFOO:bar\nCOURSE:Oni\nLEVEL:high\n#START\n#SCROLL\n#DELAY -1\n1,\n8,\n#END\n";
    let chart = load_chart(text).unwrap();
    assert_eq!(chart.warnings.len(), 5);
    assert!(chart.warnings.iter().all(|w| w.line > 0));
}
