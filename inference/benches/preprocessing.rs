use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use digit_classifier::{
    ImagePreprocessor, ModelShape, PixelConverter, RasterImage, ResizeQuality, StackBlurFilter,
    TensorPacker,
};
use image::{Rgba, RgbaImage};
use rand::Rng;

/// Canvas-like test image: dark background with random bright strokes
fn create_test_drawing(width: u32, height: u32) -> RasterImage {
    let mut image = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let mut rng = rand::thread_rng();

    for _ in 0..(width * height / 20) {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let v = rng.gen_range(128..=255);
        image.put_pixel(x, y, Rgba([v, v, v, 255]));
    }

    RasterImage::from_rgba(image)
}

/// Benchmark stack blur at different radii and canvas sizes
fn bench_stack_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_blur");

    let canvas_sizes = [(280, 280), (720, 720), (1080, 1920)];
    let radii = [1, 4, 16];

    for (width, height) in canvas_sizes.iter() {
        let image = create_test_drawing(*width, *height);
        for &radius in radii.iter() {
            let filter = StackBlurFilter::new(radius).unwrap();
            group.throughput(Throughput::Elements((*width * *height) as u64));
            group.bench_with_input(
                BenchmarkId::new("blur", format!("{}x{}_r{}", width, height, radius)),
                &image,
                |b, image| {
                    b.iter(|| filter.blur(image, 1.0));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark conversion of a canvas to model-sized grayscale
fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("pixel_convert");

    let canvas_sizes = [(28, 28), (280, 280), (1080, 1920)];
    let qualities = [
        ("nearest", ResizeQuality::Nearest),
        ("bilinear", ResizeQuality::Bilinear),
    ];

    for (width, height) in canvas_sizes.iter() {
        let image = create_test_drawing(*width, *height);
        for (name, quality) in qualities.iter() {
            let converter = PixelConverter::new(*quality);
            group.bench_with_input(
                BenchmarkId::new(*name, format!("{}x{}", width, height)),
                &image,
                |b, image| {
                    b.iter(|| converter.convert(image, 28, 28));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark the complete preprocessing chain: blur, convert, pack
fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_tensor");

    let shape = ModelShape::new(28, 28);
    let packer = TensorPacker::new(&shape);
    let plain = ImagePreprocessor::new(ResizeQuality::Bilinear);
    let blurred = ImagePreprocessor::new(ResizeQuality::Bilinear)
        .with_blur(Default::default())
        .unwrap();

    let image = create_test_drawing(1080, 1080);
    group.bench_function("plain_1080", |b| {
        b.iter(|| plain.prepare(&image, &shape, &packer));
    });
    group.bench_function("blurred_1080", |b| {
        b.iter(|| blurred.prepare(&image, &shape, &packer));
    });

    group.finish();
}

criterion_group!(benches, bench_stack_blur, bench_convert, bench_prepare);
criterion_main!(benches);
