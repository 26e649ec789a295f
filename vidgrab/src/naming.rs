use std::path::{Path, PathBuf};

use regex::Regex;

/**
    Where one episode's final output lands.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub dir: PathBuf,
    /// Full path without extension; the muxer appends `.mp4`, the subtitle
    /// fetch `.vtt`.
    pub file_stem: PathBuf,
}

/**
    Derive the output location for an episode, `Show.Name.S01E02.Title` style.

    The provider pads weak titles into the feed: broadcast-date titles
    ("Friday 12 January"), bare "Episode N" titles, and titles that just
    repeat the show name. All of those are dropped so the filename carries
    only real information. With `plex_layout` the file goes under a
    `Season XX` directory.
*/
pub fn output_plan(
    download_dir: &Path,
    show_title: &str,
    season_number: &str,
    episode_number: &str,
    episode_title: &str,
    plex_layout: bool,
) -> OutputPlan {
    let mut title = episode_title.to_string();

    let date_title = Regex::new(
        r"(?i)^(monday|tuesday|wednesday|thursday|friday|saturday|sunday) \d{0,2} ?(january|february|march|april|may|june|july|august|september|october|november|december)",
    )
    .expect("static pattern");
    if date_title.is_match(&title) {
        title.clear();
    }

    // Bare "Episode N" titles carry nothing the SxxEyy tag doesn't.
    if title.contains("Episode ") {
        title.clear();
    }

    // "Part Two: The Reckoning" -> "The Reckoning"
    if let Some(colon) = title.find(':') {
        title = title[colon + 1..].trim().to_string();
    }

    let show_subtitle = show_title.split_once(':').map(|(_, s)| s.trim());
    if show_title == title || show_subtitle.is_some_and(|s| title.contains(s)) {
        title.clear();
    }

    let season = pad2(if season_number.is_empty() {
        "01"
    } else {
        season_number
    });
    let episode = pad2(episode_number);

    let show = safe_name(show_title);
    let dir = if plex_layout {
        download_dir.join(&show).join(format!("Season {season}"))
    } else {
        download_dir.join(&show)
    };

    let pieces = format!("{show} S{season}E{episode} {}", safe_name(&title));
    let file_name = pieces.split_whitespace().collect::<Vec<_>>().join(".");

    OutputPlan {
        file_stem: dir.join(file_name),
        dir,
    }
}

/// Strip filesystem-hostile characters, keeping word characters, spaces,
/// dots and dashes.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn pad2(number: &str) -> String {
    if number.len() == 1 {
        format!("0{number}")
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(show: &str, season: &str, episode: &str, title: &str) -> OutputPlan {
        output_plan(Path::new("/downloads"), show, season, episode, title, false)
    }

    #[test]
    fn basic_episode_layout() {
        let plan = plan("Demo Show", "1", "3", "Third Time");
        assert_eq!(plan.dir, Path::new("/downloads/Demo Show"));
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/Demo Show/Demo.Show.S01E03.Third.Time")
        );
    }

    #[test]
    fn plex_layout_adds_season_directory() {
        let plan = output_plan(
            Path::new("/downloads"),
            "Demo Show",
            "1",
            "3",
            "Third Time",
            true,
        );
        assert_eq!(plan.dir, Path::new("/downloads/Demo Show/Season 01"));
    }

    #[test]
    fn broadcast_date_titles_are_dropped() {
        let plan = plan("Daily Quiz", "4", "12", "Friday 12 January");
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/Daily Quiz/Daily.Quiz.S04E12")
        );
    }

    #[test]
    fn bare_episode_titles_are_dropped() {
        let plan = plan("Cruising: Faraway Shores", "2", "5", "Episode 5");
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/Cruising Faraway Shores/Cruising.Faraway.Shores.S02E05")
        );
    }

    #[test]
    fn title_equal_to_show_is_dropped() {
        let plan = plan("One Off", "", "1", "One Off");
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/One Off/One.Off.S01E01")
        );
    }

    #[test]
    fn title_repeating_show_subtitle_is_dropped() {
        let plan = plan("Cruising: Faraway Shores", "2", "5", "Faraway Shores Special");
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/Cruising Faraway Shores/Cruising.Faraway.Shores.S02E05")
        );
    }

    #[test]
    fn titles_with_colons_keep_the_subtitle() {
        let plan = plan("Demo Show", "1", "3", "Part Two: The Reckoning");
        assert_eq!(
            plan.file_stem,
            Path::new("/downloads/Demo Show/Demo.Show.S01E03.The.Reckoning")
        );
    }

    #[test]
    fn numbers_are_zero_padded() {
        let plan = plan("Demo Show", "10", "3", "x");
        assert!(plan.file_stem.to_string_lossy().contains("S10E03"));
    }

    #[test]
    fn safe_name_strips_hostile_characters() {
        assert_eq!(safe_name("What/If: Part 1?"), "WhatIf Part 1");
        assert_eq!(safe_name("  padded  "), "padded");
    }
}
