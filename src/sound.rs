use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    },
    thread,
};

use anyhow::Result;
use log::{debug, warn};
use rodio::{Decoder, OutputStream, Sink};

use crate::alerts::SoundSink;

enum ChimeCommand {
    Play(PathBuf),
}

/// Plays alert chimes on a dedicated thread holding the non-Send rodio
/// output objects, fed through an mpsc channel. Decode and device errors are
/// logged and swallowed; the monitoring loop never waits on audio.
pub struct ChimePlayer {
    tx: Arc<Mutex<Option<Sender<ChimeCommand>>>>,
}

impl ChimePlayer {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<ChimeCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow::anyhow!("chime player channel poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<ChimeCommand>();

        thread::Builder::new()
            .name("chime-player".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        ChimeCommand::Play(path) => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                warn!("{err}");
                                continue;
                            }
                            let file = match File::open(&path) {
                                Ok(file) => file,
                                Err(err) => {
                                    warn!("failed to open chime {}: {err}", path.display());
                                    continue;
                                }
                            };
                            match Decoder::new(BufReader::new(file)) {
                                Ok(source) => {
                                    if let Some(ref s) = sink {
                                        s.append(source);
                                    }
                                }
                                Err(err) => {
                                    warn!("failed to decode chime {}: {err}", path.display())
                                }
                            }
                        }
                    }
                }
            })?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }
}

impl Default for ChimePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundSink for ChimePlayer {
    fn play(&self, clip: &Path) -> Result<()> {
        if !clip.exists() {
            debug!("chime clip {} does not exist, skipping", clip.display());
            return Ok(());
        }
        let tx = self.ensure_thread()?;
        tx.send(ChimeCommand::Play(clip.to_path_buf()))
            .map_err(|_| anyhow::anyhow!("chime player thread is gone"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_clip_is_a_noop() {
        let player = ChimePlayer::new();
        player
            .play(Path::new("/definitely/not/a/real/clip.wav"))
            .unwrap();
    }
}
