use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use slipscan_core::SlipConfig;

use crate::extract::Extractor;
use crate::preprocess::{Normalizer, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::ExtractionResult;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Upload has no usable file name")]
    EmptyFilename,
    #[error("Pipeline worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A slip that went through the whole pipeline.
#[derive(Debug)]
pub struct ProcessedSlip {
    /// File name the upload was stored under.
    pub filename: String,
    /// Where the upload was saved.
    pub stored_path: PathBuf,
    pub result: ExtractionResult,
}

/// Orchestrates: store upload → normalize → OCR → extract.
///
/// Holds no mutable state; one instance can serve any number of slips
/// concurrently.
pub struct SlipPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    normalizer: Normalizer,
    lang: Arc<str>,
    uploads_dir: PathBuf,
}

fn run_stages<R: OcrBackend + ?Sized>(
    normalizer: &Normalizer,
    recognizer: &R,
    lang: &str,
    data: &[u8],
) -> Result<ExtractionResult, PipelineError> {
    let image = normalizer.normalize_bytes(data)?;
    debug!(width = image.width(), height = image.height(), "image normalized");

    let text = recognizer.recognize(&image, lang)?;
    debug!(chars = text.chars().count(), lang, "text recognized");

    Ok(Extractor::extract_result(&text))
}

impl<R: OcrBackend> SlipPipeline<R> {
    pub fn new(recognizer: R, config: &SlipConfig) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            normalizer: Normalizer::new(&config.preprocess),
            lang: Arc::from(config.ocr.lang.as_str()),
            uploads_dir: config.storage.uploads_dir.clone(),
        }
    }

    /// Image bytes in, extraction out. Fails only when the bytes are not an
    /// image or the engine cannot run; empty OCR output gives empty fields.
    pub fn run(&self, data: &[u8]) -> Result<ExtractionResult, PipelineError> {
        run_stages(&self.normalizer, self.recognizer.as_ref(), &self.lang, data)
    }
}

impl<R: OcrBackend + 'static> SlipPipeline<R> {
    /// [`SlipPipeline::run`] on the blocking pool; OCR can take seconds.
    async fn run_blocking(&self, data: Vec<u8>) -> Result<ExtractionResult, PipelineError> {
        let recognizer = Arc::clone(&self.recognizer);
        let normalizer = self.normalizer;
        let lang = Arc::clone(&self.lang);
        tokio::task::spawn_blocking(move || {
            run_stages(&normalizer, recognizer.as_ref(), &lang, &data)
        })
        .await?
    }

    /// Save an upload into the uploads folder, then run it.
    pub async fn process_upload(
        &self,
        filename: &str,
        data: &[u8],
    ) -> Result<ProcessedSlip, PipelineError> {
        let stored_path = store_upload(&self.uploads_dir, filename, data).await?;
        let result = self.run_blocking(data.to_vec()).await?;
        info!(
            file = %stored_path.display(),
            amount = ?result.amount.map(|a| a.to_string()),
            date = ?result.date.as_ref().map(|d| d.to_string()),
            "slip processed"
        );
        Ok(ProcessedSlip {
            filename: upload_name(filename)?.to_string(),
            stored_path,
            result,
        })
    }

    /// Process a file on disk as if it had been uploaded under its own name.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessedSlip, PipelineError> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(PipelineError::EmptyFilename)?;
        self.process_upload(name, &data).await
    }
}

/// Final path component of a client-supplied name; rejects names with none.
fn upload_name(filename: &str) -> Result<&str, PipelineError> {
    Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or(PipelineError::EmptyFilename)
}

/// Write `data` to `<uploads_dir>/<filename>`, replacing an earlier upload
/// of the same name.
pub async fn store_upload(
    uploads_dir: &Path,
    filename: &str,
    data: &[u8],
) -> Result<PathBuf, PipelineError> {
    let dest = uploads_dir.join(upload_name(filename)?);
    tokio::fs::create_dir_all(uploads_dir).await?;
    tokio::fs::write(&dest, data).await?;
    Ok(dest)
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// A file in the intake folder is complete once it is closed after writing,
/// or when it is moved in whole. Creation alone fires before any bytes land.
fn is_intake_ready(kind: &notify::EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Spawn a notify watcher on `watch_dir` that sends completed file paths to `tx`.
/// Returns the watcher; it must be kept alive for watching to continue.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        let ev = match event {
            Ok(ev) => ev,
            Err(e) => {
                warn!("Intake watcher error: {e}");
                return;
            }
        };
        if !is_intake_ready(&ev.kind) {
            return;
        }
        for path in ev.paths.into_iter().filter(|p| p.is_file()) {
            // Runs on the watcher's own thread, so waiting for queue space is fine.
            if let Err(e) = tx.blocking_send(path) {
                warn!("Intake queue closed, dropping {}", e.0.display());
            }
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{MockRecognizer, UnavailableRecognizer};
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use slipscan_core::{Amount, SlipDate, StorageConfig};
    use std::io::Cursor;

    const SLIP_TEXT: &str =
        "  ธนาคารกสิกรไทย\nโอนเงินสำเร็จ\nยอดเงิน 250.00 บาท\nค่าธรรมเนียม 0.00 บาท\n15 มี.ค. 2567 10:42 น.\n";

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(8, 8, |x, _| Luma([if x < 4 { 20 } else { 230 }]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn config_in(dir: &Path) -> SlipConfig {
        SlipConfig { storage: StorageConfig::under(dir), ..SlipConfig::default() }
    }

    #[test]
    fn run_extracts_amount_and_verbatim_thai_date() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &config_in(dir.path()));

        let result = pipeline.run(&tiny_png()).unwrap();

        assert_eq!(result.amount, Amount::parse("250.00"));
        assert_eq!(result.date, Some(SlipDate::Verbatim("15 มี.ค. 2567".into())));
        assert_eq!(result.raw_text, SLIP_TEXT.trim());
    }

    #[test]
    fn empty_ocr_output_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(""), &config_in(dir.path()));

        let result = pipeline.run(&tiny_png()).unwrap();
        assert_eq!(result, ExtractionResult::default());
    }

    #[test]
    fn undecodable_upload_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &config_in(dir.path()));

        let err = pipeline.run(b"GIF89a but not really").unwrap_err();
        assert!(matches!(err, PipelineError::Preprocess(PreprocessError::Decode(_))));
    }

    #[test]
    fn missing_engine_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(UnavailableRecognizer, &config_in(dir.path()));

        let err = pipeline.run(&tiny_png()).unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::Unavailable(_))));
    }

    #[tokio::test]
    async fn process_upload_stores_file_under_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path());
        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &cfg);
        let data = tiny_png();

        let slip = pipeline.process_upload("slip-0315.png", &data).await.unwrap();

        assert_eq!(slip.filename, "slip-0315.png");
        assert_eq!(slip.stored_path, cfg.storage.uploads_dir.join("slip-0315.png"));
        assert_eq!(std::fs::read(&slip.stored_path).unwrap(), data);
        assert_eq!(slip.result.amount, Amount::parse("250.00"));
    }

    #[tokio::test]
    async fn process_upload_strips_directories_from_name() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path());
        let pipeline = SlipPipeline::new(MockRecognizer::new(""), &cfg);

        let slip = pipeline.process_upload("../../etc/slip.png", &tiny_png()).await.unwrap();
        assert_eq!(slip.filename, "slip.png");
        assert_eq!(slip.stored_path, cfg.storage.uploads_dir.join("slip.png"));
    }

    #[tokio::test]
    async fn process_upload_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(""), &config_in(dir.path()));

        for name in ["", "   ", ".."] {
            let err = pipeline.process_upload(name, &tiny_png()).await.unwrap_err();
            assert!(matches!(err, PipelineError::EmptyFilename), "name {name:?}");
        }
    }

    #[tokio::test]
    async fn process_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("from-phone.png");
        std::fs::write(&src, tiny_png()).unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &config_in(dir.path()));

        let slip = pipeline.process_file(&src).await.unwrap();
        assert_eq!(slip.filename, "from-phone.png");
        assert!(slip.stored_path.exists());
    }

    #[test]
    fn pipeline_runs_from_several_threads() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &config_in(dir.path()));
        let data = tiny_png();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| pipeline.run(&data).unwrap())).collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert!(results.windows(2).all(|w| w[0] == w[1]));
        });
    }

    struct SlowRecognizer(std::time::Duration);

    impl OcrBackend for SlowRecognizer {
        fn recognize(
            &self,
            _image: &crate::preprocess::NormalizedImage,
            _lang: &str,
        ) -> Result<String, OcrError> {
            std::thread::sleep(self.0);
            Ok(SLIP_TEXT.to_string())
        }
    }

    #[tokio::test]
    async fn slow_recognition_does_not_stall_the_runtime() {
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            SlipPipeline::new(SlowRecognizer(Duration::from_millis(600)), &config_in(dir.path()));
        let data = tiny_png();
        let start = Instant::now();

        let ticker = async {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            start.elapsed()
        };
        let (slip, ticked_after) = tokio::join!(pipeline.process_upload("slow.png", &data), ticker);

        assert_eq!(slip.unwrap().result.amount, Amount::parse("250.00"));
        assert!(ticked_after < Duration::from_millis(450), "ticker took {ticked_after:?}");
    }

    #[test]
    fn intake_ready_only_on_finished_files() {
        use notify::event::{
            AccessKind, AccessMode, CreateKind, DataChange, ModifyKind, RenameMode,
        };
        use notify::EventKind;

        assert!(is_intake_ready(&EventKind::Access(AccessKind::Close(AccessMode::Write))));
        assert!(is_intake_ready(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));

        assert!(!is_intake_ready(&EventKind::Create(CreateKind::File)));
        assert!(!is_intake_ready(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
        assert!(!is_intake_ready(&EventKind::Access(AccessKind::Close(AccessMode::Read))));
        assert!(!is_intake_ready(&EventKind::Modify(ModifyKind::Name(RenameMode::From))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn watcher_reports_file_after_all_writes_land() {
        use std::io::Write;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let _watcher = spawn_intake_watcher(dir.path(), tx).unwrap();

        let data = tiny_png();
        let (head, tail) = data.split_at(data.len() / 2);
        let path = dir.path().join("slip.png");
        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(head).unwrap();
            f.flush().unwrap();
            std::thread::sleep(Duration::from_millis(100));
            f.write_all(tail).unwrap();
        }

        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no intake event")
            .unwrap();
        assert_eq!(got, path);
        assert_eq!(std::fs::read(&got).unwrap(), data);

        let pipeline = SlipPipeline::new(MockRecognizer::new(SLIP_TEXT), &config_in(dir.path()));
        assert!(pipeline.process_file(&got).await.is_ok());

        // One finished file, one event.
        assert!(tokio::time::timeout(Duration::from_millis(200), rx.recv()).await.is_err());
    }
}
