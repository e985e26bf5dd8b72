use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use fitrs::{Fits, Hdu};
use rand::prelude::*;
use sky_overlay::cli::StyleOptions;
use sky_overlay::commands::{render_overlay, RenderRequest};
use sky_overlay::interact::{ClickEvent, MouseButton, ReportClick, Viewer};
use sky_overlay::retry::RetryPolicy;
use sky_overlay::{find_noise_area, show_overlay, Figure, OverlayConfig, OverlayInputs, SkyImage};

const RA: f64 = 161.25;
const DEC: f64 = 54.5;
const N: usize = 80;
/// 1.5 arcsec, rounded so every header value fits its 20-character field
const SCALE: f64 = 0.0004166667;
const BEAM: f64 = 0.001666667;

/// Square TAN image centred on the target, noise plus a Gaussian source.
fn write_cutout(path: &Path, seed: u64, sigma: f64, amplitude: f64, beam: bool) {
    let mut rng = StdRng::seed_from_u64(seed);
    let centre = (N as f64 - 1.0) / 2.0;
    let data: Vec<f64> = (0..N * N)
        .map(|i| {
            let (x, y) = ((i % N) as f64 - centre, (i / N) as f64 - centre);
            let (u1, u2): (f64, f64) = (rng.gen_range(1e-12..1.0), rng.gen());
            let noise = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            sigma * noise + amplitude * (-(x * x + y * y) / 32.0).exp()
        })
        .collect();

    let mut hdu = Hdu::new(&[N, N], data);
    hdu.insert("CTYPE1", "RA---TAN");
    hdu.insert("CTYPE2", "DEC--TAN");
    hdu.insert("CRPIX1", centre + 1.0);
    hdu.insert("CRPIX2", centre + 1.0);
    hdu.insert("CRVAL1", RA);
    hdu.insert("CRVAL2", DEC);
    hdu.insert("CDELT1", -SCALE);
    hdu.insert("CDELT2", SCALE);
    hdu.insert("OBJECT", "ILTJ104500+543000");
    if beam {
        hdu.insert("BMAJ", BEAM);
        hdu.insert("BMIN", BEAM);
        hdu.insert("BPA", 90.0);
    }
    Fits::create(path, hdu).unwrap();
}

struct Cutouts {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Cutouts {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        write_cutout(&root.join("optical.fits"), 1, 10.0, 500.0, false);
        write_cutout(&root.join("lofar.fits"), 2, 1e-4, 2e-2, true);
        Self { _dir: dir, root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[test]
fn loads_cutout_with_header_metadata() {
    let cutouts = Cutouts::new();
    let lofar = SkyImage::open(&cutouts.path("lofar.fits"), &RetryPolicy::none()).unwrap();

    assert_eq!((lofar.width, lofar.height, lofar.channels), (N, N, 1));
    assert_eq!(lofar.object.as_deref(), Some("ILTJ104500+543000"));
    let beam = lofar.beam.unwrap();
    assert!((beam.major * 3600.0 - 6.0).abs() < 1e-3);
    assert_eq!(beam.angle, 90.0);

    let (x, y) = lofar.wcs.sky_to_pixel(RA, DEC);
    assert!((x - 39.5).abs() < 1e-6 && (y - 39.5).abs() < 1e-6);

    // Box north of the source sees only the injected noise
    let background = find_noise_area(&lofar, RA, DEC + 0.012, 0.005, 0).unwrap();
    assert!((background.noise - 1e-4).abs() < 2e-5, "noise {}", background.noise);

    let on_source = find_noise_area(&lofar, RA, DEC, 0.01, 0).unwrap();
    assert!(on_source.peak > 5e-4, "peak {}", on_source.peak);
}

#[test]
fn missing_file_reports_attempts() {
    let cutouts = Cutouts::new();
    let policy = RetryPolicy {
        max_attempts: 2,
        max_backoff: std::time::Duration::ZERO,
    };
    let err = SkyImage::open(&cutouts.path("absent.fits"), &policy).unwrap_err();
    assert!(format!("{:#}", err).contains("2 attempts"));
}

#[test]
fn renders_overlay_png_through_library() {
    let cutouts = Cutouts::new();
    let policy = RetryPolicy::none();
    let mut inputs = OverlayInputs::new(
        SkyImage::open(&cutouts.path("optical.fits"), &policy).unwrap(),
        RA,
        DEC,
        0.025,
    );
    inputs.lofar = Some(SkyImage::open(&cutouts.path("lofar.fits"), &policy).unwrap());

    let output = cutouts.path("overlay.png");
    let config = OverlayConfig {
        canvas_size: 300,
        title: Some("ILTJ104500+543000".to_string()),
        save_name: Some(output.clone()),
        circle_radius: Some(0.005),
        ..OverlayConfig::default()
    };

    let figure = show_overlay(&inputs, &config, None, None).unwrap();
    let png = image::open(&output).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), figure.render().dimensions());

    let yellow = figure
        .plot()
        .pixels()
        .filter(|p| p.0 == [255, 255, 0, 255])
        .count();
    assert!(yellow > 0, "primary contours missing");
}

#[test]
fn render_command_with_annotations() {
    let cutouts = Cutouts::new();
    std::fs::write(
        cutouts.path("catalogue.csv"),
        "Source_Name,RA,DEC,Maj,Min,PA\nILTJ104500+543000,161.25,54.5,0.003,0.002,45\n",
    )
    .unwrap();
    std::fs::write(cutouts.path("hosts.csv"), "ra,dec\n161.252,54.501\n").unwrap();
    std::fs::write(
        cutouts.path("regions.reg"),
        "# Region file format: DS9 version 4.1\nfk5\ncircle(161.25,54.5,20\") # color=magenta\n",
    )
    .unwrap();
    std::fs::write(cutouts.path("style.json"), r#"{"canvas_size": 240, "lofar_level": 3.0}"#).unwrap();

    let output = cutouts.path("rendered.png");
    render_overlay(RenderRequest {
        optical: cutouts.path("optical.fits"),
        ra: RA,
        dec: DEC,
        size: 0.025,
        lofar: Some(cutouts.path("lofar.fits")),
        first: None,
        vlass: None,
        catalogue: Some(cutouts.path("catalogue.csv")),
        positions: vec![format!("{}:o:cyan", cutouts.path("hosts.csv").display())],
        region: Some(cutouts.path("regions.reg")),
        config: Some(cutouts.path("style.json")),
        output: Some(output.clone()),
        retries: 1,
        style: StyleOptions {
            title: Some("ILTJ104500+543000".to_string()),
            ..StyleOptions::default()
        },
    })
    .unwrap();

    let png = image::open(&output).unwrap().to_rgba8();
    assert!(png.width() > 240 && png.height() > 240);
    assert!(png.pixels().any(|p| p.0 == [255, 0, 255, 255]), "region missing");
}

#[derive(Default)]
struct CollectingViewer {
    shown: Rc<RefCell<Vec<bool>>>,
}

impl Viewer for CollectingViewer {
    fn show(&mut self, figure: &Figure, block: bool) -> Result<()> {
        assert!(figure.has_click_handler());
        self.shown.borrow_mut().push(block);
        Ok(())
    }
}

#[test]
fn interactive_overlay_goes_to_viewer() {
    let cutouts = Cutouts::new();
    let policy = RetryPolicy::none();
    let inputs = OverlayInputs::new(
        SkyImage::open(&cutouts.path("optical.fits"), &policy).unwrap(),
        RA,
        DEC,
        0.025,
    );
    let config = OverlayConfig {
        canvas_size: 120,
        interactive: true,
        block: false,
        show_lofar: false,
        ..OverlayConfig::default()
    };

    let mut viewer = CollectingViewer::default();
    let shown = viewer.shown.clone();
    let factory: sky_overlay::interact::HandlerFactory =
        Box::new(|_figure: &Figure| Box::new(ReportClick::new()) as Box<dyn sky_overlay::interact::ClickHandler>);
    let mut figure = show_overlay(&inputs, &config, Some(&mut viewer), Some(factory)).unwrap();

    assert_eq!(*shown.borrow(), vec![false]);
    assert!(figure.dispatch_click(&ClickEvent {
        x: 60.0,
        y: 60.0,
        button: MouseButton::Middle,
    }));
}
