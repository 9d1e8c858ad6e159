use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use tempfile::TempDir;

use transcriber::{
    AudioNormalizer, Backend, Error, ModelCache, ModelKey, Opts, OutputKind, RawSegment,
    Recognition, RecognitionParams, Stage, Task, Transcriber,
};

/// Normalizer that writes a placeholder file instead of decoding anything.
#[derive(Default)]
struct FakeNormalizer {
    fail: bool,
    calls: RefCell<Vec<(PathBuf, u32, u16)>>,
}

impl AudioNormalizer for FakeNormalizer {
    fn normalize(
        &self,
        _source: &Path,
        target: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<PathBuf> {
        self.calls
            .borrow_mut()
            .push((target.to_path_buf(), sample_rate, channels));
        if self.fail {
            bail!("ffmpeg exited with status 1");
        }
        fs::write(target, b"RIFF")?;
        Ok(target.to_path_buf())
    }
}

#[derive(Debug)]
struct FakeModel {
    key: ModelKey,
}

/// Backend returning canned segments; loads fail for any device listed in `failing_devices`.
struct FakeBackend {
    failing_devices: Vec<&'static str>,
    segments: Vec<RawSegment>,
    detected_language: &'static str,
    fail_at_segment: Option<usize>,
    loads: Cell<usize>,
    last_params: RefCell<Option<RecognitionParams>>,
    used_keys: RefCell<Vec<ModelKey>>,
}

impl FakeBackend {
    fn new(segments: Vec<RawSegment>) -> Self {
        Self {
            failing_devices: Vec::new(),
            segments,
            detected_language: "en",
            fail_at_segment: None,
            loads: Cell::new(0),
            last_params: RefCell::new(None),
            used_keys: RefCell::new(Vec::new()),
        }
    }

    fn failing_on(mut self, devices: &[&'static str]) -> Self {
        self.failing_devices = devices.to_vec();
        self
    }
}

impl Backend for FakeBackend {
    type Model = FakeModel;

    fn load(&self, key: &ModelKey) -> Result<FakeModel> {
        self.loads.set(self.loads.get() + 1);
        if self.failing_devices.contains(&key.device.as_str()) {
            bail!("no {} device available", key.device);
        }
        Ok(FakeModel { key: key.clone() })
    }

    fn recognize<'m>(
        &self,
        model: &'m FakeModel,
        audio_path: &Path,
        params: &RecognitionParams,
    ) -> Result<Recognition<'m>> {
        if !audio_path.is_file() {
            bail!("normalized audio missing: {}", audio_path.display());
        }

        self.used_keys.borrow_mut().push(model.key.clone());
        *self.last_params.borrow_mut() = Some(params.clone());

        let fail_at = self.fail_at_segment;
        let segments = self
            .segments
            .clone()
            .into_iter()
            .enumerate()
            .map(move |(i, seg)| {
                if Some(i) == fail_at {
                    Err(anyhow!("decoder state corrupted"))
                } else {
                    Ok(seg)
                }
            });

        Ok(Recognition {
            language: params
                .language
                .clone()
                .unwrap_or_else(|| self.detected_language.to_owned()),
            duration: 3.0,
            segments: Box::new(segments),
        })
    }
}

fn hello_world() -> Vec<RawSegment> {
    vec![
        RawSegment::new(0.0, 1.5, " Hello "),
        RawSegment::new(1.5, 3.0, "World"),
    ]
}

const HELLO_WORLD_SRT: &str =
    "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:01,500 --> 00:00:03,000\nWorld\n\n";

struct Fixture {
    dir: TempDir,
    opts: Opts,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("talk.mp4");
        fs::write(&input, b"not really media")?;

        let mut opts = Opts::new(&input);
        opts.output_srt = Some(dir.path().join("out").join("talk.srt"));
        opts.output_json = Some(dir.path().join("out").join("talk.json"));

        Ok(Self { dir, opts })
    }

    fn srt_path(&self) -> &Path {
        self.opts.output_srt.as_deref().unwrap()
    }

    fn json_path(&self) -> &Path {
        self.opts.output_json.as_deref().unwrap()
    }
}

#[test]
fn writes_subtitles_and_metadata() -> Result<()> {
    let fx = Fixture::new()?;
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());
    let cache = ModelCache::new();

    let out = transcriber.run(&cache, &fx.opts)?;

    assert_eq!(fs::read_to_string(fx.srt_path())?, HELLO_WORLD_SRT);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(fx.json_path())?)?;
    assert_eq!(json["language"], "en");
    assert_eq!(json["duration"], 3.0);
    let segments = json["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0]["text"], "Hello");
    assert!(segments.iter().all(|s| s["lang"] == "en"));
    assert!(segments[0]["avg_logprob"].is_null());
    assert!(segments[0]["no_speech_prob"].is_null());

    assert_eq!(out.summary.language, "en");
    assert_eq!(out.summary.duration, 3.0);
    assert_eq!(out.summary.segments_count, 2);
    assert_eq!(out.summary.srt.as_deref(), Some(fx.srt_path()));
    assert_eq!(out.summary.json.as_deref(), Some(fx.json_path()));
    assert_eq!(out.result.segments.len(), 2);
    Ok(())
}

#[test]
fn normalizes_to_16k_mono_next_to_metadata() -> Result<()> {
    let fx = Fixture::new()?;
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    transcriber.run(&ModelCache::new(), &fx.opts)?;

    let calls = transcriber.normalizer().calls.borrow();
    assert_eq!(
        calls.as_slice(),
        &[(
            fx.dir.path().join("out").join("talk.normalized.wav"),
            16_000,
            1
        )]
    );
    Ok(())
}

#[test]
fn workdir_defaults_to_cache_dir_next_to_input() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.opts.output_json = None;
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    transcriber.run(&ModelCache::new(), &fx.opts)?;

    let wav = fx
        .dir
        .path()
        .join("transcriber_cache")
        .join("talk.normalized.wav");
    assert!(wav.is_file());
    assert!(fx.srt_path().is_file());
    Ok(())
}

#[test]
fn falls_back_to_cpu_int8_with_identical_output() -> Result<()> {
    let fx = Fixture::new()?;
    let backend = FakeBackend::new(hello_world()).failing_on(&["cuda"]);
    let transcriber = Transcriber::new(backend, FakeNormalizer::default());
    let cache = ModelCache::new();

    transcriber.run(&cache, &fx.opts)?;

    let primary_fx = Fixture::new()?;
    Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default())
        .run(&ModelCache::new(), &primary_fx.opts)?;

    assert_eq!(fs::read_to_string(fx.srt_path())?, HELLO_WORLD_SRT);
    assert_eq!(
        fs::read_to_string(fx.json_path())?,
        fs::read_to_string(primary_fx.json_path())?
    );
    assert_eq!(transcriber.backend().loads.get(), 2);
    assert_eq!(
        transcriber.backend().used_keys.borrow().as_slice(),
        &[ModelKey::new("small", "cpu", "int8")]
    );
    assert_eq!(cache.resident_key(), Some(ModelKey::cpu_fallback("small")));
    Ok(())
}

#[test]
fn double_load_failure_writes_nothing() -> Result<()> {
    let fx = Fixture::new()?;
    let backend = FakeBackend::new(hello_world()).failing_on(&["cuda", "cpu"]);
    let transcriber = Transcriber::new(backend, FakeNormalizer::default());
    let cache = ModelCache::new();

    let err = transcriber.run(&cache, &fx.opts).unwrap_err();

    assert!(matches!(err, Error::ModelLoad { .. }));
    assert_eq!(err.stage(), Stage::ModelLoad);
    let msg = err.to_string();
    assert!(msg.contains("model load"), "{msg}");
    assert!(msg.contains("no cuda device"), "{msg}");
    assert!(msg.contains("no cpu device"), "{msg}");

    assert!(!fx.srt_path().exists());
    assert!(!fx.json_path().exists());
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn blank_segments_never_reach_outputs() -> Result<()> {
    let fx = Fixture::new()?;
    let segments = vec![
        RawSegment::new(0.0, 1.0, "Hello"),
        RawSegment::new(1.0, 2.0, "   "),
        RawSegment::new(2.0, 3.0, ""),
        RawSegment::new(3.0, 4.0, "Again"),
    ];
    let transcriber = Transcriber::new(FakeBackend::new(segments), FakeNormalizer::default());

    let out = transcriber.run(&ModelCache::new(), &fx.opts)?;

    assert_eq!(out.summary.segments_count, 2);
    assert_eq!(
        fs::read_to_string(fx.srt_path())?,
        "1\n00:00:00,000 --> 00:00:01,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nAgain\n\n"
    );

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(fx.json_path())?)?;
    assert_eq!(json["segments"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn no_speech_writes_empty_outputs() -> Result<()> {
    let fx = Fixture::new()?;
    let transcriber = Transcriber::new(FakeBackend::new(Vec::new()), FakeNormalizer::default());

    let out = transcriber.run(&ModelCache::new(), &fx.opts)?;

    assert_eq!(out.summary.segments_count, 0);
    assert_eq!(fs::read_to_string(fx.srt_path())?, "");
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(fx.json_path())?)?;
    assert_eq!(json["segments"], serde_json::json!([]));
    Ok(())
}

#[test]
fn missing_input_fails_before_any_work() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.opts.input_path = fx.dir.path().join("missing.mp4");
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    let err = transcriber.run(&ModelCache::new(), &fx.opts).unwrap_err();

    assert!(matches!(err, Error::InputNotFound(_)));
    assert_eq!(err.stage(), Stage::Input);
    assert!(transcriber.normalizer().calls.borrow().is_empty());
    assert_eq!(transcriber.backend().loads.get(), 0);
    Ok(())
}

#[test]
fn normalization_failure_stops_the_run() -> Result<()> {
    let fx = Fixture::new()?;
    let normalizer = FakeNormalizer {
        fail: true,
        ..FakeNormalizer::default()
    };
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), normalizer);

    let err = transcriber.run(&ModelCache::new(), &fx.opts).unwrap_err();

    assert_eq!(err.stage(), Stage::Normalization);
    assert!(err.to_string().contains("ffmpeg exited"));
    assert_eq!(transcriber.backend().loads.get(), 0);
    assert!(!fx.srt_path().exists());
    assert!(!fx.json_path().exists());
    Ok(())
}

#[test]
fn recognition_error_mid_sequence_writes_nothing() -> Result<()> {
    let fx = Fixture::new()?;
    let mut backend = FakeBackend::new(hello_world());
    backend.fail_at_segment = Some(1);
    let transcriber = Transcriber::new(backend, FakeNormalizer::default());

    let err = transcriber.run(&ModelCache::new(), &fx.opts).unwrap_err();

    assert_eq!(err.stage(), Stage::Recognition);
    assert!(!fx.srt_path().exists());
    assert!(!fx.json_path().exists());
    Ok(())
}

#[test]
fn subtitle_write_failure_reports_output_stage() -> Result<()> {
    let mut fx = Fixture::new()?;
    let blocker = fx.dir.path().join("blocker");
    fs::write(&blocker, b"")?;
    fx.opts.output_srt = Some(blocker.join("talk.srt"));
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    let err = transcriber.run(&ModelCache::new(), &fx.opts).unwrap_err();

    assert!(matches!(
        err,
        Error::Output {
            kind: OutputKind::Subtitle,
            ..
        }
    ));
    // Subtitles are written first, so metadata was never attempted.
    assert!(!fx.json_path().exists());
    Ok(())
}

#[test]
fn metadata_write_failure_keeps_subtitles() -> Result<()> {
    let fx = Fixture::new()?;
    // A directory squatting on the metadata path makes the file unwritable while its parent
    // (the working directory) stays usable.
    fs::create_dir_all(fx.json_path())?;
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    let err = transcriber.run(&ModelCache::new(), &fx.opts).unwrap_err();

    assert!(matches!(
        err,
        Error::Output {
            kind: OutputKind::Metadata,
            ..
        }
    ));
    assert_eq!(err.stage(), Stage::Output);
    assert_eq!(fs::read_to_string(fx.srt_path())?, HELLO_WORLD_SRT);
    Ok(())
}

#[test]
fn inverted_segment_span_is_clamped() -> Result<()> {
    let fx = Fixture::new()?;
    let segments = vec![RawSegment::new(2.0, 1.0, "Backwards")];
    let transcriber = Transcriber::new(FakeBackend::new(segments), FakeNormalizer::default());

    let out = transcriber.run(&ModelCache::new(), &fx.opts)?;

    assert_eq!(
        fs::read_to_string(fx.srt_path())?,
        "1\n00:00:02,000 --> 00:00:02,000\nBackwards\n\n"
    );
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(fx.json_path())?)?;
    assert_eq!(json["segments"][0]["start"], 2.0);
    assert_eq!(json["segments"][0]["end"], 2.0);
    assert!(out.result.segments.iter().all(|s| s.start <= s.end));
    Ok(())
}

#[test]
fn cache_is_reused_across_runs() -> Result<()> {
    let fx = Fixture::new()?;
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());
    let cache = ModelCache::new();

    transcriber.run(&cache, &fx.opts)?;
    transcriber.run(&cache, &fx.opts)?;
    assert_eq!(transcriber.backend().loads.get(), 1);

    let mut other = fx.opts.clone();
    other.model_name = "medium".to_owned();
    transcriber.run(&cache, &other)?;
    assert_eq!(transcriber.backend().loads.get(), 2);
    assert_eq!(
        cache.resident_key(),
        Some(ModelKey::new("medium", "cuda", "float16"))
    );
    Ok(())
}

#[test]
fn passes_task_language_and_profile_to_backend() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.opts.task = Task::Translate;
    fx.opts.language = Some("es".to_owned());
    fx.opts.quality = "QUALITY".to_owned();
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    let out = transcriber.run(&ModelCache::new(), &fx.opts)?;

    let params = transcriber.backend().last_params.borrow().clone().unwrap();
    assert_eq!(params.task, Task::Translate);
    assert_eq!(params.language.as_deref(), Some("es"));
    assert_eq!(params.profile.beam_size, 5);
    assert!(params.profile.vad_filter);
    assert!(params.profile.word_timestamps);
    assert_eq!(out.summary.language, "es");
    Ok(())
}

#[test]
fn unknown_quality_runs_balanced() -> Result<()> {
    let mut fx = Fixture::new()?;
    fx.opts.quality = "ultra".to_owned();
    let transcriber = Transcriber::new(FakeBackend::new(hello_world()), FakeNormalizer::default());

    transcriber.run(&ModelCache::new(), &fx.opts)?;

    let params = transcriber.backend().last_params.borrow().clone().unwrap();
    assert_eq!(params.profile.beam_size, 3);
    assert!(params.profile.vad_filter);
    assert!(!params.profile.word_timestamps);
    Ok(())
}
