mod common;

use common::*;
use graindetect::output::validate_output_path;
use std::path::Path;

#[test]
fn test_blur_defaults_by_name() -> anyhow::Result<()> {
    assert_eq!(BlurMethod::parse("none", None)?, BlurMethod::None);
    assert_eq!(
        BlurMethod::parse("average", None)?,
        BlurMethod::Average { kernel_width: 5, kernel_height: 5 }
    );
    assert_eq!(
        BlurMethod::parse("gaussian", None)?,
        BlurMethod::Gaussian { kernel_width: 3, kernel_height: 3, sigma: 0.0 }
    );
    assert_eq!(BlurMethod::parse("median", None)?, BlurMethod::Median { kernel_size: 5 });
    assert_eq!(
        "bilateral".parse::<BlurMethod>()?,
        BlurMethod::Bilateral { diameter: 9, sigma_color: 75.0, sigma_space: 75.0 }
    );
    Ok(())
}

#[test]
fn test_blur_parameter_literals() -> anyhow::Result<()> {
    assert_eq!(
        BlurMethod::parse("average", Some("(7,3)"))?,
        BlurMethod::Average { kernel_width: 7, kernel_height: 3 }
    );
    assert_eq!(
        BlurMethod::parse("average", Some("4"))?,
        BlurMethod::Average { kernel_width: 4, kernel_height: 4 }
    );
    assert_eq!(
        BlurMethod::parse("gaussian", Some("[(5,5),0]"))?,
        BlurMethod::Gaussian { kernel_width: 5, kernel_height: 5, sigma: 0.0 }
    );
    assert_eq!(
        BlurMethod::parse("Median", Some(" 3 "))?,
        BlurMethod::Median { kernel_size: 3 }
    );
    assert_eq!(
        BlurMethod::parse("bilateral", Some("(5, 50, 25.5)"))?,
        BlurMethod::Bilateral { diameter: 5, sigma_color: 50.0, sigma_space: 25.5 }
    );
    // Parameters are ignored without a blur
    assert_eq!(BlurMethod::parse("none", Some("(5,5)"))?, BlurMethod::None);
    Ok(())
}

#[test]
fn test_blur_rejects_bad_input() {
    let cases: [(&str, Option<&str>); 9] = [
        ("sharpen", None),
        ("average", Some("(5,5,5)")),
        ("average", Some("(0,5)")),
        ("average", Some("(a,b)")),
        ("gaussian", Some("(4,4,0)")),
        ("gaussian", Some("(0,0,0)")),
        ("median", Some("4")),
        ("median", Some("2.5")),
        ("bilateral", Some("(0,75,0)")),
    ];
    for (method, params) in cases {
        let result = BlurMethod::parse(method, params);
        assert!(matches!(result, Err(GrainError::Config(_))), "{method} {params:?}");
    }
}

#[test]
fn test_blur_display_names_method() -> anyhow::Result<()> {
    for name in BlurMethod::NAMES {
        let blur: BlurMethod = name.parse()?;
        assert_eq!(blur.name(), name);
        assert!(blur.to_string().starts_with(name));
    }
    Ok(())
}

#[test]
fn test_threshold_range() {
    assert_eq!(DetectionConfig::threshold_from(0).unwrap(), 0);
    assert_eq!(DetectionConfig::threshold_from(208).unwrap(), 208);
    assert_eq!(DetectionConfig::threshold_from(255).unwrap(), 255);
    assert!(matches!(DetectionConfig::threshold_from(256), Err(GrainError::Config(_))));
    assert!(matches!(DetectionConfig::threshold_from(-1), Err(GrainError::Config(_))));
}

#[test]
fn test_detection_config_defaults() {
    let config = DetectionConfig::default();
    assert_eq!(config.threshold, DetectionConfig::DEFAULT_THRESHOLD);
    assert_eq!(config.blur, BlurMethod::None);
    assert!(config.trim_first && config.trim_second);
    assert!(config.suppress_single_blob);

    let custom = DetectionConfig::new(150)
        .with_blur(BlurMethod::Median { kernel_size: 3 })
        .with_trim(false, true)
        .with_single_blob_suppression(false);
    assert_eq!(custom.threshold, 150);
    assert!(!custom.trim_first && custom.trim_second);
    assert!(!custom.suppress_single_blob);
    assert!(custom.validate().is_ok());

    let invalid = DetectionConfig::new(150).with_blur(BlurMethod::Median { kernel_size: 4 });
    assert!(matches!(invalid.validate(), Err(GrainError::Config(_))));
}

#[test]
fn test_output_must_be_csv() {
    assert!(validate_output_path(Path::new("coordinate_list.csv")).is_ok());
    assert!(validate_output_path(Path::new("out/GRAINS.CSV")).is_ok());
    assert!(matches!(validate_output_path(Path::new("grains.txt")), Err(GrainError::Input(_))));
    assert!(matches!(validate_output_path(Path::new("grains")), Err(GrainError::Input(_))));
}

#[test]
fn test_blur_sizes_are_bounded() -> anyhow::Result<()> {
    let max = BlurMethod::MAX_KERNEL_SIZE;
    let cases: [(&str, &str); 6] = [
        ("gaussian", "[(0,0),1e12]"),
        ("gaussian", "[(0,3),50]"),
        ("average", "(999,3)"),
        ("median", "301"),
        ("bilateral", "(301,75,75)"),
        ("bilateral", "(0,75,1000)"),
    ];
    for (method, params) in cases {
        let result = BlurMethod::parse(method, Some(params));
        assert!(matches!(result, Err(GrainError::Config(_))), "{method} {params}");
    }

    // The bound itself is accepted
    assert_eq!(
        BlurMethod::parse("median", Some(&max.to_string()))?,
        BlurMethod::Median { kernel_size: max }
    );
    assert!(BlurMethod::parse("gaussian", Some("[(0,0),40]")).is_ok());
    assert!(BlurMethod::parse("bilateral", Some("(0,75,80)")).is_ok());
    Ok(())
}
