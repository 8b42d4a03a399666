use log::{error, info, warn};
use std::env;
use std::error::Error;
use std::sync::Arc;
use tokio::task;

use gnss_sdr_nav::cn0_estimator::Cn0Estimator;
use gnss_sdr_nav::code_replica::CodeReplicaTable;
use gnss_sdr_nav::config::{AppConfig, APP_CONFIG_FILE};
use gnss_sdr_nav::data_process::{post_navigation, ProcessStage};
use gnss_sdr_nav::gps_ca_prn::generate_ca_code;
use gnss_sdr_nav::results_store::{save_navigation_results, save_tracking_results};
use gnss_sdr_nav::stream::{FileSource, SampleSource};
use gnss_sdr_nav::tracking::{select_channels, track_channel, TrackingError, TrackingProgress};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config_file = env::args().nth(1).unwrap_or_else(|| APP_CONFIG_FILE.to_string());
    let config = AppConfig::from_toml_file(&config_file)?;
    info!("configuration loaded from {}", config_file);

    let source: Arc<dyn SampleSource> = Arc::new(FileSource::open(
        &config.input.file_name,
        config.input.sample_format,
    )?);
    info!(
        "{} samples in {}",
        source.len(),
        config.input.file_name
    );

    let channels = select_channels(
        &config.channels,
        config.navigation.acquisition_threshold,
        config.receiver.number_of_channels,
    );
    if channels.is_empty() {
        warn!("no acquired channel to track");
        return Ok(());
    }

    let params = Arc::new(config.tracking_params());
    let replicas = Arc::new(CodeReplicaTable::new(
        channels.iter().map(|c| c.prn),
        params.code_length,
        generate_ca_code,
    )?);

    let (progress_tx, progress_rx) = crossbeam_channel::unbounded::<TrackingProgress>();
    let progress_logger = task::spawn_blocking(move || {
        for report in progress_rx.iter() {
            info!(
                "PRN {:2}: {:5.1}% of {} ms",
                report.prn,
                100.0 * report.fraction(),
                report.total_ms
            );
        }
    });

    info!("{} of {} channels", ProcessStage::SignalTracking, channels.len());
    let mut handlers = Vec::new();
    for channel in channels {
        let source_clone = Arc::clone(&source);
        let replicas_clone = Arc::clone(&replicas);
        let params_clone = Arc::clone(&params);
        let tx = progress_tx.clone();
        handlers.push(task::spawn_blocking(move || {
            let replica = replicas_clone
                .replica(channel.prn)
                .ok_or(TrackingError::UnknownPrn(channel.prn))?;
            track_channel(&channel, replica, source_clone.as_ref(), &params_clone, Some(&tx))
        }));
    }
    drop(progress_tx);

    let mut tracking_results = Vec::new();
    for handle in handlers {
        match handle.await? {
            Ok(result) => {
                let cn0 = Cn0Estimator::series(&result.epochs);
                info!(
                    "PRN {}: {} ms tracked, final CN0 {:.1} dB-Hz",
                    result.prn,
                    result.epochs.len(),
                    cn0.last().copied().unwrap_or_default()
                );
                tracking_results.push(result);
            }
            Err(e) => error!("{}", e),
        }
    }
    progress_logger.await?;
    save_tracking_results(&config.output.tracking_results_file, &tracking_results)?;

    let navigation = post_navigation(&tracking_results, &config.navigation_params())?;
    for ch in &navigation.channels {
        info!(
            "PRN {}: subframe at {} ms, TOW {} s, ephemeris complete: {}",
            ch.prn,
            ch.subframe_start,
            ch.tow,
            ch.ephemeris.is_complete()
        );
    }
    if let Some(first) = navigation.measurements.first() {
        for pr in &first.pseudoranges {
            info!("TOW {} s PRN {}: {:.3} m", first.tow, pr.prn, pr.range_m);
        }
    }
    save_navigation_results(&config.output.navigation_results_file, &navigation)?;

    Ok(())
}
