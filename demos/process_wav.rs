#![cfg_attr(not(feature = "deepfilter"), allow(dead_code, unused_imports))]

#[cfg(feature = "deepfilter")]
use alt_denoiser::{DeepFilterFactory, Processor, ProcessorConfig, ProcessorParameter, meter};
use std::env;

#[cfg(not(feature = "deepfilter"))]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    Err("Enable the `deepfilter` feature to run this example.".into())
}

const USAGE: &str =
    "usage: process_wav --model <archive> [--attenuation <db>] [--block <frames>] <input.wav> <output.wav>";

#[cfg(feature = "deepfilter")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut model_path = None;
    let mut attenuation = 100.0f32;
    let mut block_size = 512usize;
    let mut files = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--model" => model_path = args.next(),
            "--attenuation" => attenuation = args.next().ok_or(USAGE)?.parse()?,
            "--block" => block_size = args.next().ok_or(USAGE)?.parse()?,
            _ => files.push(arg),
        }
    }
    let (Some(model_path), [input_path, output_path]) = (model_path, files.as_slice()) else {
        return Err(USAGE.into());
    };

    let reader = hound::WavReader::open(input_path)?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;

    let mut samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect::<Result<_, _>>()?
        }
    };
    let num_frames = samples.len() / num_channels;
    println!(
        "Loaded {input_path}: {} Hz, {num_channels} channel(s), {num_frames} frames",
        spec.sample_rate
    );

    let mut processor = Processor::new(DeepFilterFactory::from_file(model_path)).with_config(ProcessorConfig {
        attenuation_limit_db: attenuation,
        model_log_level: Some("warn".to_string()),
        ..Default::default()
    });
    let latency = processor.prepare(spec.sample_rate, block_size)?;
    if !processor.is_ready() {
        return Err(format!("model could not be loaded: {:?}", processor.model_error()).into());
    }
    println!("Latency: {latency} samples");

    let context = processor.context();
    context.set_parameter(ProcessorParameter::AttenuationLimit, attenuation)?;

    // Flush the pipeline so the tail of the file comes out too.
    samples.resize((num_frames + latency) * num_channels, 0.0);
    for block in samples.chunks_mut(block_size * num_channels) {
        processor.process_interleaved(block, num_channels);
    }

    let diagnostics = context.diagnostics();
    println!(
        "Processed {} blocks, output level {:.1} dB, {} underruns",
        diagnostics.blocks_processed,
        meter::gain_to_db(context.output_level()),
        diagnostics.converter_underruns
    );

    let out_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output_path, out_spec)?;
    for &sample in &samples[latency * num_channels..] {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    println!("Wrote {output_path}");

    Ok(())
}
