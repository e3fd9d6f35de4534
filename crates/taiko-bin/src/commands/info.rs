use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tja_model::{BranchKind, Course, CourseStats, Song, build_timeline};

#[derive(Serialize)]
struct CourseReport {
    course: String,
    level: u32,
    branch: Option<BranchKind>,
    stats: CourseStats,
}

pub fn run(path: &Path, json: bool) -> Result<()> {
    let chart = super::load_chart(path)?;

    let mut reports = Vec::new();
    for course in chart.courses.values() {
        reports.extend(course_reports(&chart.song, course)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let song = &chart.song;
    println!("Title:    {}", song.title);
    if !song.subtitle.is_empty() {
        println!("Subtitle: {}", song.subtitle);
    }
    if !song.genre.is_empty() {
        println!("Genre:    {}", song.genre);
    }
    println!("BPM:      {}", song.bpm);
    println!("Offset:   {:.3}s", song.offset);
    if let Some(wave) = &song.wave {
        println!("Wave:     {}", wave);
    }

    for report in &reports {
        let stats = &report.stats;
        let path = report
            .branch
            .map(|b| format!(" ({})", b.name()))
            .unwrap_or_default();
        println!();
        println!("=== {} ★{}{} ===", report.course, report.level, path);
        println!(
            "  don {} / katsu {} / big don {} / big katsu {}",
            stats.dons, stats.katsus, stats.big_dons, stats.big_katsus
        );
        println!(
            "  drumrolls {} ({:.2}s), balloons {} ({} hits)",
            stats.drumrolls, stats.drumroll_seconds, stats.balloons, stats.balloon_hits
        );
        println!(
            "  max combo {}, length {:.2}s of {:.2}s",
            stats.max_combo, stats.play_length, stats.duration
        );
    }

    if !chart.warnings.is_empty() {
        println!();
        println!("=== Warnings ({}) ===", chart.warnings.len());
        for warning in &chart.warnings {
            println!("  {}", warning);
        }
    }
    Ok(())
}

/// One report per path: a single one for plain courses, three for branched ones.
fn course_reports(song: &Song, course: &Course) -> Result<Vec<CourseReport>> {
    let paths: Vec<Option<BranchKind>> = if course.has_branches() {
        BranchKind::ALL.into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    paths
        .into_iter()
        .map(|branch| {
            let timeline = build_timeline(song, course, branch)?;
            Ok(CourseReport {
                course: course.difficulty.name().to_string(),
                level: course.level,
                branch,
                stats: CourseStats::from_timeline(&timeline),
            })
        })
        .collect()
}
