use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::process::Command;

use crate::config::Config;
use crate::naming::{self, OutputPlan, safe_name};
use crate::pipeline::EpisodeStream;

/**
    Hand-off to the external engines: `yt-dlp` pulls the elementary streams
    from the media manifest, `mp4decrypt` applies the content key, `ffmpeg`
    muxes the result. This module only sequences those processes; it never
    touches media formats itself.
*/
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Prefer the audio-description track over the default one.
    pub audio_description: bool,
    pub subtitles: bool,
    pub plex_layout: bool,
    pub force: bool,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Completed(PathBuf),
    AlreadyExists(PathBuf),
}

pub async fn download_episode(
    client: &reqwest::Client,
    config: &Config,
    stream: &EpisodeStream,
    options: &DownloadOptions,
) -> Result<DownloadOutcome> {
    let plan = naming::output_plan(
        &config.download_dir,
        &stream.show_title,
        &stream.season_number,
        &stream.episode_number,
        &stream.episode_title,
        options.plex_layout,
    );
    let output_file = plan.file_stem.with_extension("mp4");
    if output_file.is_file() && !options.force {
        println!(
            "[download] {} already exists; use --force to overwrite",
            output_file.display()
        );
        return Ok(DownloadOutcome::AlreadyExists(output_file));
    }

    std::fs::create_dir_all(&config.tmp_dir)
        .with_context(|| format!("cannot create '{}'", config.tmp_dir.display()))?;
    // The staging directory cleans itself up on drop, so aborted downloads
    // leave nothing behind.
    let staging = tempfile::Builder::new()
        .prefix("vidgrab-")
        .tempdir_in(&config.tmp_dir)?;

    let stem = safe_name(&format!(
        "{}_{}",
        stream.show_title, stream.episode_title
    ));

    fetch_streams(
        config,
        &stream.mpd_url,
        staging.path(),
        &stem,
        options.audio_description,
    )
    .await?;

    let decrypted = decrypt_streams(config, &stream.key.to_string(), staging.path()).await?;

    mux_streams(config, &decrypted, &plan, options.force).await?;

    if options.subtitles {
        fetch_subtitles(client, stream.subtitles_url.as_deref(), &plan).await;
    }

    println!("[download] wrote {}", output_file.display());
    Ok(DownloadOutcome::Completed(output_file))
}

/// Pull the (still encrypted) elementary streams with yt-dlp.
async fn fetch_streams(
    config: &Config,
    mpd_url: &str,
    staging: &Path,
    stem: &str,
    audio_description: bool,
) -> Result<()> {
    // Best video plus worst audio is the provider's plain track; the
    // audio-description track is the "best" one.
    let format = if audio_description { "bv,ba" } else { "bv,wa" };
    let template = staging.join(format!("encrypted_{stem}.%(ext)s"));

    run_engine(
        config.engine("yt-dlp"),
        Command::new(config.engine("yt-dlp"))
            .arg("--allow-unplayable-formats")
            .arg("-q")
            .arg("--no-warnings")
            .arg("--progress")
            .arg("-f")
            .arg(format)
            .arg(mpd_url)
            .arg("-o")
            .arg(&template),
    )
    .await
}

/// Decrypt every fetched stream with mp4decrypt and the canonical key.
async fn decrypt_streams(config: &Config, key: &str, staging: &Path) -> Result<Vec<PathBuf>> {
    let encrypted = encrypted_files(staging)?;
    if encrypted.is_empty() {
        bail!("yt-dlp produced no streams in '{}'", staging.display());
    }

    let mut decrypted = Vec::with_capacity(encrypted.len());
    for input in encrypted {
        let output = decrypted_name(&input).context("unexpected staging file name")?;
        run_engine(
            config.engine("mp4decrypt"),
            Command::new(config.engine("mp4decrypt"))
                .arg("--key")
                .arg(key)
                .arg(&input)
                .arg(&output),
        )
        .await?;
        decrypted.push(output);
    }
    decrypted.sort();
    Ok(decrypted)
}

/// Mux the decrypted streams into the final container.
async fn mux_streams(
    config: &Config,
    decrypted: &[PathBuf],
    plan: &OutputPlan,
    force: bool,
) -> Result<()> {
    let [video_or_audio, other] = decrypted else {
        bail!(
            "expected one video and one audio stream to mux, got {}",
            decrypted.len()
        );
    };

    std::fs::create_dir_all(&plan.dir)
        .with_context(|| format!("cannot create '{}'", plan.dir.display()))?;

    let mut command = Command::new(config.engine("ffmpeg"));
    command.arg("-hide_banner").arg("-loglevel").arg("error");
    if force {
        command.arg("-y");
    }
    command
        .arg("-i")
        .arg(video_or_audio)
        .arg("-i")
        .arg(other)
        .arg("-c")
        .arg("copy")
        .arg(plan.file_stem.with_extension("mp4"));

    run_engine(config.engine("ffmpeg"), &mut command).await
}

/// Subtitles are best-effort: the derived document often does not exist.
async fn fetch_subtitles(client: &reqwest::Client, subtitles_url: Option<&str>, plan: &OutputPlan) {
    let Some(url) = subtitles_url else {
        return;
    };

    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(body) => {
                let path = plan.file_stem.with_extension("vtt");
                match std::fs::write(&path, &body) {
                    Ok(()) => println!("[download] wrote {}", path.display()),
                    Err(e) => eprintln!("[download] cannot write subtitles: {e}"),
                }
            }
            Err(e) => eprintln!("[download] subtitle fetch failed: {e}"),
        },
        Ok(_) => println!("[download] subtitles are not available"),
        Err(e) => eprintln!("[download] subtitle fetch failed: {e}"),
    }
}

fn encrypted_files(staging: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(staging)
        .with_context(|| format!("cannot read '{}'", staging.display()))?
    {
        let path = entry?.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("encrypted_"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decrypted_name(encrypted: &Path) -> Option<PathBuf> {
    let name = encrypted.file_name()?.to_str()?;
    let renamed = name.strip_prefix("encrypted_")?;
    Some(encrypted.with_file_name(format!("decrypted_{renamed}")))
}

async fn run_engine(program: PathBuf, command: &mut Command) -> Result<()> {
    let status = command
        .status()
        .await
        .with_context(|| format!("failed to launch '{}'", program.display()))?;
    if !status.success() {
        bail!("'{}' exited with {status}", program.display());
    }
    Ok(())
}
