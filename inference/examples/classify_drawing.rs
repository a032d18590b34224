// Classify a drawing from disk (or a synthetic stroke when no image is given)
//
// Usage:
//   cargo run --example classify_drawing -- [image.png] [config.json] [examples.txt LABEL]
//
// Without the `onnx` feature the stub engine is used, so the prediction only
// reflects the average ink intensity.
use digit_classifier::{
    ClassificationPipeline, ClassifierConfig, EngineType, ExampleLog, ModelResource,
    RasterImage,
};
use image::{Rgba, RgbaImage};
use std::env;
use std::time::Instant;

/// A 280x280 canvas with a single vertical stroke, roughly a "1"
fn synthetic_drawing() -> RasterImage {
    let mut canvas = RgbaImage::from_pixel(280, 280, Rgba([0, 0, 0, 255]));
    for y in 40..240 {
        for x in 130..150 {
            canvas.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    RasterImage::from_rgba(canvas)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();

    println!("✍️  Handwritten Digit Classifier v{}", digit_classifier::version());
    println!("========================================");

    let config = match args.get(2) {
        Some(path) => ClassifierConfig::from_file(path)?,
        None => ClassifierConfig::default(),
    };
    println!("✅ Configuration: engine {:?}", config.engine);

    let image = match args.get(1) {
        Some(path) => RasterImage::open(path)?,
        None => synthetic_drawing(),
    };
    println!("✅ Drawing loaded: {}x{}", image.width(), image.height());

    let resource = config.model_resource();
    let mut pipeline = ClassificationPipeline::new(config.clone())?;
    if config.engine == EngineType::Stub && resource.open().is_err() {
        // the stub ignores weights; any non-empty blob will do
        pipeline = pipeline.with_resource(ModelResource::from_bytes("stub-model", vec![0u8; 1]));
    }

    let start = Instant::now();
    let shape = pipeline.initialize().wait()?;
    println!(
        "✅ Model ready in {:.1}ms: input {}x{}",
        start.elapsed().as_secs_f32() * 1000.0,
        shape.input_width,
        shape.input_height
    );

    let start = Instant::now();
    let result = pipeline.classify(image.clone())?;
    println!(
        "\n{}\n(took {:.1}ms)",
        result,
        start.elapsed().as_secs_f32() * 1000.0
    );

    if let (Some(path), Some(label)) = (args.get(3), args.get(4)) {
        let label: u8 = label.parse()?;
        let mut log = ExampleLog::new(path);
        log.record(&pipeline.preprocess(&image)?, label);
        log.save()?;
        println!("💾 Saved training example labelled {} to {}", label, path);
    }

    pipeline.close().wait()?;
    println!("✅ Pipeline closed");

    Ok(())
}
