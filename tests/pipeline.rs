use ecg_monitor::config::{AnalysisConfig, DetectorKind, DisplayMode};
use ecg_monitor::filtering::filter_batch;
use ecg_monitor::heart_analysis::HeartMeasures;
use ecg_monitor::pipeline::{EcgPipeline, Report};
use ecg_monitor::synthetic::SyntheticEcg;

type HeartRates = Vec<(u64, Option<u32>)>;
type HrvReports = Vec<(u64, Option<HeartMeasures>)>;

fn run(pipeline: &mut EcgPipeline, signal: &[f64]) -> (HeartRates, HrvReports) {
    let mut heart_rates = Vec::new();
    let mut hrv = Vec::new();
    for &x in signal {
        for report in pipeline.step(x).reports {
            match report {
                Report::HeartRate { at_sample, bpm } => heart_rates.push((at_sample, bpm)),
                Report::Hrv {
                    at_sample,
                    measures,
                } => hrv.push((at_sample, measures)),
            }
        }
    }
    (heart_rates, hrv)
}

fn assert_near(value: Option<u32>, expected: u32, tolerance: u32) {
    let value = value.expect("heart rate should be defined");
    assert!(
        value.abs_diff(expected) <= tolerance,
        "expected {} +/- {}, got {}",
        expected,
        tolerance,
        value
    );
}

#[test]
fn test_steady_sixty_bpm() {
    let signal = SyntheticEcg::with_interval(200.0, 200).generate(2000);
    let mut pipeline = EcgPipeline::new(AnalysisConfig::default()).unwrap();
    let (heart_rates, hrv) = run(&mut pipeline, &signal);

    assert_eq!(heart_rates.len(), 10);
    for (at_sample, bpm) in &heart_rates {
        if *at_sample < 600 {
            assert_eq!(*bpm, None, "short buffer not full at {}", at_sample);
        } else {
            assert_near(*bpm, 60, 1);
        }
    }

    assert_eq!(hrv.len(), 1);
    let measures = hrv[0].1.expect("long buffer is full");
    let ibi = measures.ibi.expect("ibi defined");
    assert!((ibi - 1000.0).abs() < 10.0, "ibi {}", ibi);
    assert!(measures.sdnn.unwrap() < 10.0);
    assert!(measures.rmssd.unwrap() < 10.0);
    assert_eq!(measures.pnn50, Some(0.0));
}

#[test]
fn test_faster_rhythm_at_higher_rate() {
    let config = AnalysisConfig::new(250.0);
    let signal = SyntheticEcg::new(250.0, 90.0).generate(2500);
    let mut pipeline = EcgPipeline::new(config).unwrap();
    let (heart_rates, _) = run(&mut pipeline, &signal);

    assert_eq!(heart_rates.len(), 10);
    for (_, bpm) in &heart_rates[3..] {
        assert_near(*bpm, 90, 2);
    }
}

#[test]
fn test_template_detector_end_to_end() {
    let config = AnalysisConfig {
        detector: DetectorKind::TemplateCorrelation,
        ..AnalysisConfig::default()
    };
    let signal = SyntheticEcg::new(200.0, 75.0).generate(2000);
    let mut pipeline = EcgPipeline::new(config).unwrap();
    let (heart_rates, hrv) = run(&mut pipeline, &signal);

    for (_, bpm) in &heart_rates[3..] {
        assert_near(*bpm, 75, 2);
    }
    let measures = hrv[0].1.unwrap();
    assert!((measures.ibi.unwrap() - 800.0).abs() < 15.0);
}

#[test]
fn test_switching_detector_mid_stream() {
    let signal = SyntheticEcg::with_interval(200.0, 200).generate(2000);
    let mut pipeline = EcgPipeline::new(AnalysisConfig::default()).unwrap();

    let (first, _) = run(&mut pipeline, &signal[..1000]);
    pipeline.update_settings(DisplayMode::Raw, DetectorKind::TemplateCorrelation);
    let (second, _) = run(&mut pipeline, &signal[1000..]);

    assert_near(first.last().unwrap().1, 60, 1);
    assert_eq!(pipeline.detector_kind(), DetectorKind::TemplateCorrelation);
    assert_eq!(pipeline.settings().version, 1);
    for (_, bpm) in &second {
        assert_near(*bpm, 60, 2);
    }
}

#[test]
fn test_streaming_matches_batch_filtering() {
    let signal = SyntheticEcg::new(200.0, 72.0).generate(1500);
    let batch = filter_batch(200.0, &signal).unwrap();

    let mut pipeline = EcgPipeline::new(AnalysisConfig::default()).unwrap();
    for (i, &x) in signal.iter().enumerate() {
        let reading = pipeline.step(x).reading;
        assert_eq!(reading.raw, x);
        assert!(
            (reading.filtered - batch[i]).abs() < 1e-9,
            "sample {}: {} vs {}",
            i,
            reading.filtered,
            batch[i]
        );
    }
}

#[test]
fn test_flat_line_has_no_results() {
    let signal = vec![2048.0; 2000];
    let mut pipeline = EcgPipeline::new(AnalysisConfig::default()).unwrap();
    let (heart_rates, hrv) = run(&mut pipeline, &signal);

    assert!(heart_rates.iter().all(|(_, bpm)| bpm.is_none()));
    assert_eq!(hrv, vec![(2000, Some(HeartMeasures::undefined()))]);
}

#[test]
fn test_reports_serialize_tagged() {
    let report = Report::HeartRate {
        at_sample: 600,
        bpm: Some(60),
    };
    assert_eq!(
        serde_json::to_string(&report).unwrap(),
        r#"{"kind":"heart_rate","at_sample":600,"bpm":60}"#
    );

    let report = Report::Hrv {
        at_sample: 2000,
        measures: None,
    };
    assert_eq!(
        serde_json::to_string(&report).unwrap(),
        r#"{"kind":"hrv","at_sample":2000,"measures":null}"#
    );
}
