use image::{
    Rgb,
    RgbImage,
};
use pigeon70::{
    CancellationToken,
    Decoder,
    ProtocolConfig,
    Waveform,
    decoder::Anchor,
    encode,
    frame,
    sink::file::write_wav,
    source::file::read_wav,
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};

fn config() -> ProtocolConfig {
    ProtocolConfig {
        width: 16,
        height: 4,
        pixel_time: 20e-3,
        ..ProtocolConfig::PIGEON70
    }
}

fn gradient(config: &ProtocolConfig) -> RgbImage {
    RgbImage::from_fn(config.width as u32, config.height as u32, |x, y| {
        Rgb([(x * 17) as u8, (y * 85) as u8, 255 - (x * 17) as u8])
    })
}

fn mean_absolute_error(a: &RgbImage, b: &RgbImage) -> f32 {
    frame::mean_absolute_error(a, b).unwrap()
}

#[test]
fn gradient_survives_wav_file() {
    let config = config();
    let image = gradient(&config);
    let waveform = encode(&image, &config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gradient.wav");
    write_wav(&path, &waveform).unwrap();
    let waveform = read_wav(&path).unwrap();
    assert_eq!(waveform.sample_rate(), config.sample_rate);

    let decoded = Decoder::new(config)
        .unwrap()
        .decode_with(&waveform, &mut (), &CancellationToken::new());

    assert_eq!(decoded.report.anchor, Anchor::Found(0));
    assert!(decoded.report.is_complete());
    let error = mean_absolute_error(&image, &decoded.image);
    assert!(error < 10.0, "mean absolute error {error}");
}

#[test]
fn decodes_through_noise() {
    let config = config();
    let image = gradient(&config);
    let mut samples = encode(&image, &config).unwrap().into_samples();

    let mut rng = StdRng::seed_from_u64(70);
    for sample in &mut samples {
        *sample += rng.gen_range(-0.1..=0.1);
    }
    let waveform = Waveform::new(samples, config.sample_rate);

    let decoded = Decoder::new(config)
        .unwrap()
        .decode_with(&waveform, &mut (), &CancellationToken::new());

    assert!(matches!(decoded.report.anchor, Anchor::Found(_)));
    assert_eq!(decoded.report.lines_synced, 4);
    let error = mean_absolute_error(&image, &decoded.image);
    assert!(error < 10.0, "mean absolute error {error}");
}

#[test]
fn truncated_recording_keeps_decoded_lines() {
    let config = config();
    let image = gradient(&config);
    let mut waveform = encode(&image, &config).unwrap();
    waveform.truncate(config.vis_len() + 2 * config.line_len() + config.line_len() / 2);

    let decoded = Decoder::new(config)
        .unwrap()
        .decode_with(&waveform, &mut (), &CancellationToken::new());

    assert!(decoded.report.truncated);
    assert_eq!(decoded.report.lines_decoded, 2);
    assert_eq!(decoded.image.dimensions(), (16, 4));

    let assert_close = |x: u32, y: u32, channels: std::ops::Range<usize>| {
        let expected = image.get_pixel(x, y).0;
        let actual = decoded.image.get_pixel(x, y).0;
        for channel in channels {
            assert!(
                expected[channel].abs_diff(actual[channel]) <= 8,
                "pixel ({x}, {y}) channel {channel}"
            );
        }
    };

    for y in 0..2 {
        for x in 0..16 {
            assert_close(x, y, 0..3);
        }
    }

    // the cut leaves 23 full pixel slots of row 2: pixels 0 to 6 and the red
    // and green slots of pixel 7.
    for x in 0..7 {
        assert_close(x, 2, 0..3);
    }
    assert_close(7, 2, 0..2);
    assert_eq!(decoded.image.get_pixel(7, 2).0[2], 0);
    for x in 8..16 {
        assert_eq!(decoded.image.get_pixel(x, 2).0, [0, 0, 0], "pixel ({x}, 2)");
    }

    assert!(decoded.image.rows().nth(3).unwrap().all(|pixel| pixel.0 == [0, 0, 0]));
}

#[test]
fn solid_red_decodes_to_red() {
    let config = config();
    let image = RgbImage::from_pixel(16, 4, Rgb([255, 0, 0]));
    let waveform = encode(&image, &config).unwrap();

    let decoded = Decoder::new(config)
        .unwrap()
        .decode_with(&waveform, &mut (), &CancellationToken::new());

    assert!(decoded.report.is_complete());
    assert_eq!(decoded.report.lines_synced, 4);
    for (x, y, pixel) in decoded.image.enumerate_pixels() {
        assert_eq!(pixel.0, [255, 0, 0], "pixel ({x}, {y})");
    }
}

#[test]
fn test_pattern_loops_back() {
    let config = config();
    let image = frame::test_pattern(config.width, config.height);
    let waveform = encode(&image, &config).unwrap();
    let decoded = pigeon70::decode(&waveform, &config).unwrap();

    let error = mean_absolute_error(&image, &decoded);
    assert!(error < 10.0, "mean absolute error {error}");
}

#[test]
fn default_preset_round_trip_completes() {
    let config = ProtocolConfig::default();
    assert!(config.pixel_resolution().is_marginal());

    let image = RgbImage::from_pixel(320, 240, Rgb([128, 64, 200]));
    let waveform = encode(&image, &config).unwrap();
    assert_eq!(waveform.len(), config.waveform_len());

    let mut reports = 0;
    let decoded = Decoder::new(config).unwrap().decode_with(
        &waveform,
        &mut |_: f32, _: &str| reports += 1,
        &CancellationToken::new(),
    );

    assert_eq!(decoded.image.dimensions(), (320, 240));
    assert_eq!(decoded.report.anchor, Anchor::Found(0));
    assert_eq!(decoded.report.lines_synced, 240);
    assert!(decoded.report.is_complete());
    assert!(reports >= 240);
}
