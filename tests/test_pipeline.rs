use chunk_pipeline::{
    assemble, rle, ChunkSink, Mode, PassthroughStage, PipelineBuilder, PipelineConfig,
    PipelineError, Representation, StageMetrics, StageRegistry, TransformConfig,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A writer whose contents stay reachable after the pipeline owns it
#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Hands out its data in randomly sized reads, so chunks land anywhere
struct ChoppyReader {
    data: Vec<u8>,
    pos: usize,
    rng: StdRng,
}

impl Read for ChoppyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.data.len() - self.pos;
        if left == 0 || buf.is_empty() {
            return Ok(0);
        }
        let n = self.rng.gen_range(1..=buf.len().min(left));
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn run_codec(
    input: &[u8],
    mode: Mode,
    reader: usize,
    codec: usize,
    writer: usize,
) -> Result<Vec<u8>, PipelineError> {
    let output = SharedOutput::default();
    let mut pipeline = PipelineBuilder::new()
        .source("reader", input, reader)
        .transform("rle", rle::codec(mode), codec)
        .sink("writer", output.clone(), writer)
        .build()?;
    pipeline.run()?;
    Ok(output.contents())
}

/// Runs, literals, long runs and literals past the record limits
fn sample_data(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        let remaining = len - data.len();
        if rng.gen_bool(0.5) {
            let run = rng.gen_range(1..=300).min(remaining);
            let value: u8 = rng.gen();
            data.extend(std::iter::repeat(value).take(run));
        } else {
            let literal = rng.gen_range(1..=300).min(remaining);
            data.extend((0..literal).map(|_| rng.gen::<u8>()));
        }
    }
    data
}

#[test]
fn test_encode_decode_round_trip_across_buffer_sizes() {
    let mut rng = StdRng::seed_from_u64(7);
    let input = sample_data(&mut rng, 5000);

    let sizes = [(1, 1, 1), (2, 3, 5), (7, 64, 13), (128, 129, 4096), (4096, 1, 3)];
    for &(reader, codec, writer) in &sizes {
        let encoded = run_codec(&input, Mode::Encode, reader, codec, writer).unwrap();
        for &decode_reader in &[1, 2, 3, 129, 1000] {
            let decoded = run_codec(&encoded, Mode::Decode, decode_reader, codec, writer).unwrap();
            assert_eq!(decoded, input, "sizes {reader}/{codec}/{writer}, decode reader {decode_reader}");
        }
    }
}

#[test]
fn test_decode_with_arbitrary_rechunking() {
    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..20 {
        let len = rng.gen_range(0..3000);
        let input = sample_data(&mut rng, len);
        let encoded = run_codec(&input, Mode::Encode, 4096, 4096, 4096).unwrap();

        let output = SharedOutput::default();
        let reader = ChoppyReader {
            data: encoded,
            pos: 0,
            rng: StdRng::seed_from_u64(round),
        };
        let mut pipeline = PipelineBuilder::new()
            .source("reader", reader, 16)
            .transform("rle", rle::codec(Mode::Decode), 5)
            .sink("writer", output.clone(), 7)
            .build()
            .unwrap();
        pipeline.run().unwrap();
        assert_eq!(output.contents(), input, "round {round}");
    }
}

#[test]
fn test_chunk_boundary_split_decode() {
    // (3,'A')(5,'B') with the reader splitting after the second control byte
    let encoded = [0x03, 0x41, 0x05, 0x42];
    let decoded = run_codec(&encoded, Mode::Decode, 3, 16, 16).unwrap();
    assert_eq!(decoded, b"AAABBBBB");
}

#[test]
fn test_empty_input() {
    assert!(run_codec(&[], Mode::Encode, 8, 8, 8).unwrap().is_empty());
    assert!(run_codec(&[], Mode::Decode, 8, 8, 8).unwrap().is_empty());
}

#[test]
fn test_truncated_run_is_malformed() {
    let err = run_codec(&[5], Mode::Decode, 8, 8, 8).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedStream { .. }));
    assert_eq!(err.stage(), Some("rle-decode"));
}

#[test]
fn test_record_limits_through_pipeline() {
    assert_eq!(run_codec(&[9; 127], Mode::Encode, 512, 512, 512).unwrap(), vec![127, 9]);
    assert_eq!(run_codec(&[9; 128], Mode::Encode, 512, 512, 512).unwrap(), vec![127, 9, 1, 9]);

    let distinct: Vec<u8> = (0..129).map(|i| i as u8).collect();
    let encoded = run_codec(&distinct, Mode::Encode, 512, 512, 512).unwrap();
    assert_eq!(encoded[0], 0x80);
    assert_eq!(&encoded[1..129], &distinct[..128]);
    assert_eq!(&encoded[129..], &[0xFF, 128]);
}

#[test]
fn test_encoder_restarts_at_every_chunk() {
    let encoded = run_codec(&[b'A'; 8], Mode::Encode, 4, 64, 64).unwrap();
    assert_eq!(encoded, vec![4, b'A', 4, b'A']);
}

#[test]
fn test_encode_passthrough_decode_chain() {
    let mut rng = StdRng::seed_from_u64(3);
    let input = sample_data(&mut rng, 2000);
    let output = SharedOutput::default();
    let mut pipeline = PipelineBuilder::new()
        .source("reader", input.as_slice(), 33)
        .transform("encode", rle::codec(Mode::Encode), 10)
        .transform("copy", Box::new(PassthroughStage), 3)
        .transform("decode", rle::codec(Mode::Decode), 17)
        .sink("writer", output.clone(), 64)
        .build()
        .unwrap();
    pipeline.run().unwrap();

    assert_eq!(output.contents(), input);
    assert_eq!(pipeline.stage_count(), 5);
    let source = pipeline.stage_metrics(0).unwrap();
    let sink = pipeline.stage_metrics(4).unwrap();
    assert_eq!(source.total_bytes_in(), input.len() as u64);
    assert_eq!(sink.total_bytes_out(), input.len() as u64);
}

#[test]
fn test_sink_negotiates_ints_from_source() {
    let input: Vec<u8> = (0..=255).collect();
    let output = SharedOutput::default();
    let metrics = StageMetrics::new("writer");
    let sink = ChunkSink::new("writer", output.clone(), 10, metrics.clone())
        .unwrap()
        .with_accepts(&[Representation::Ints, Representation::Bytes]);
    let mut pipeline = PipelineBuilder::new()
        .source("reader", input.as_slice(), 12)
        .sink_stage(sink, metrics)
        .build()
        .unwrap();
    pipeline.run().unwrap();
    assert_eq!(output.contents(), input);
}

#[test]
fn test_ints_survive_short_reads() {
    let input: Vec<u8> = (0..=255).collect();
    let reader = ChoppyReader {
        data: input.clone(),
        pos: 0,
        rng: StdRng::seed_from_u64(5),
    };
    let output = SharedOutput::default();
    let metrics = StageMetrics::new("writer");
    let sink = ChunkSink::new("writer", output.clone(), 8, metrics.clone())
        .unwrap()
        .with_accepts(&[Representation::Ints]);
    let mut pipeline = PipelineBuilder::new()
        .source("reader", reader, 16)
        .sink_stage(sink, metrics)
        .build()
        .unwrap();
    pipeline.run().unwrap();
    assert_eq!(output.contents(), input);
}

#[test]
fn test_zero_capacity_sink_fails_at_build() {
    let metrics = StageMetrics::new("writer");
    assert!(matches!(
        ChunkSink::new("writer", io::sink(), 0, metrics.clone()),
        Err(PipelineError::Config(_))
    ));

    let input = vec![1u8; 64];
    let result = PipelineBuilder::new()
        .source("reader", input.as_slice(), 8)
        .transform("rle", rle::codec(Mode::Encode), 8)
        .sink("writer", io::sink(), 0)
        .build();
    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[test]
fn test_wiring_failure_reads_nothing() {
    struct CountingReader(Arc<AtomicUsize>);

    impl Read for CountingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(0)
        }
    }

    let reads = Arc::new(AtomicUsize::new(0));
    let metrics = StageMetrics::new("writer");
    let sink = ChunkSink::new("writer", io::sink(), 8, metrics.clone())
        .unwrap()
        .with_accepts(&[Representation::Chars]);
    let result = PipelineBuilder::new()
        .source("reader", CountingReader(Arc::clone(&reads)), 8)
        .transform("rle", rle::codec(Mode::Encode), 8)
        .sink_stage(sink, metrics)
        .build();

    match result {
        Err(PipelineError::NoCommonRepresentation { provider, consumer }) => {
            assert_eq!(provider, "rle");
            assert_eq!(consumer, "writer");
        }
        _ => panic!("expected a wiring error"),
    }
    assert_eq!(reads.load(Ordering::Relaxed), 0);
}

#[test]
fn test_write_failure_aborts_run() {
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let input = vec![1u8; 100];
    let mut pipeline = PipelineBuilder::new()
        .source("reader", input.as_slice(), 10)
        .transform("rle", rle::codec(Mode::Encode), 2)
        .sink("writer", Closed, 4)
        .build()
        .unwrap();
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
    assert_eq!(err.stage(), Some("writer"));
}

fn run_file_config(from: &Path, to: &Path, mode: Mode, registry: &StageRegistry) {
    let mut config = PipelineConfig::sample();
    config.input = from.to_path_buf();
    config.output = to.to_path_buf();
    config.reader.buffer_size = 100;
    config.transforms = vec![TransformConfig {
        stage: "rle".into(),
        buffer_size: 77,
        mode: Some(mode),
    }];
    config.writer.buffer_size = 50;
    config.validate().unwrap();

    let input = File::open(&config.input).unwrap();
    let output = File::create(&config.output).unwrap();
    let mut pipeline = assemble(&config, registry, input, output).unwrap();
    pipeline.run().unwrap();
}

#[test]
fn test_assemble_from_config_with_files() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.bin");
    let packed = dir.path().join("packed.rle");
    let restored = dir.path().join("restored.bin");

    let mut rng = StdRng::seed_from_u64(11);
    let data = sample_data(&mut rng, 10_000);
    std::fs::write(&plain, &data).unwrap();

    let registry = StageRegistry::with_defaults();
    run_file_config(&plain, &packed, Mode::Encode, &registry);
    run_file_config(&packed, &restored, Mode::Decode, &registry);

    assert!(std::fs::metadata(&packed).unwrap().len() < data.len() as u64);
    assert_eq!(std::fs::read(&restored).unwrap(), data);
}
