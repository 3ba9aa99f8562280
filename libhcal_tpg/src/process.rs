use std::fs::File;
use std::ops::Range;
use std::sync::mpsc::Sender;

use super::accumulator::EventScratch;
use super::algo::{Conditions, TriggerPrimitiveAlgo};
use super::config::Config;
use super::digi::TrigPrimDigiCollection;
use super::electronics_map::CsvElectronicsMap;
use super::error::ProcessorError;
use super::event::{EventFile, EventRecord, EventResult, ResultFile};
use super::finegrain::{DepthFinegrainBit, FeatureBit};
use super::worker_status::{BarColor, WorkerStatus};

/// Run the emulator and both post-processing passes on one event
pub fn emulate_event(
    config: &Config,
    algo: &TriggerPrimitiveAlgo,
    emap: &CsvElectronicsMap,
    conditions: &Conditions,
    scratch: &mut EventScratch,
    event: &EventRecord,
) -> EventResult {
    let mut digis = TrigPrimDigiCollection::new();
    let report = algo.run(scratch, conditions, &event.frames, &mut digis);
    if config.run_zs {
        algo.run_zs(&mut digis);
    }
    let fe_error_digis = if config.run_fe_format_error {
        algo.run_fe_format_error(&event.raw, emap, &config.geometry, &mut digis)
    } else {
        0
    };
    EventResult {
        number: event.number,
        digis,
        diagnostics: report.diagnostics.len(),
        vetoed_slices: report.vetoed_slices,
        fe_error_digis,
    }
}

/// The main loop of a worker.
///
/// Emulates a slice of events with its own scratch context and reports its
/// progress through the channel.
pub fn process_subset(
    config: &Config,
    algo: &TriggerPrimitiveAlgo,
    emap: &CsvElectronicsMap,
    events: &[EventRecord],
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<EventResult>, ProcessorError> {
    let conditions = Conditions {
        coder: &config.coder,
        compressor: &config.compressor,
        geometry: &config.geometry,
        finegrain: &DepthFinegrainBit,
        feature_bit: config.feature_bit.as_ref().map(|b| b as &dyn FeatureBit),
    };
    let mut scratch = EventScratch::new();
    let mut results = Vec::with_capacity(events.len());

    let flush_frac: f32 = 0.01;
    let flush_val = ((events.len() as f32 * flush_frac) as usize).max(1);
    tx.send(WorkerStatus::new(0.0, 0, worker_id, BarColor::CYAN))?;
    for (count, event) in events.iter().enumerate() {
        let result = emulate_event(config, algo, emap, &conditions, &mut scratch, event);
        if result.diagnostics > 0 {
            log::warn!(
                "Event {} had {} tower diagnostics",
                event.number,
                result.diagnostics
            );
        }
        results.push(result);

        if (count + 1) % flush_val == 0 {
            tx.send(WorkerStatus::new(
                (count + 1) as f32 / events.len() as f32,
                count + 1,
                worker_id,
                BarColor::CYAN,
            ))?;
        }
    }
    tx.send(WorkerStatus::new(
        1.0,
        events.len(),
        worker_id,
        BarColor::GREEN,
    ))?;
    Ok(results)
}

/// Divide the events into contiguous ranges, one per worker.
/// Only workers that have something to do are given a range.
pub fn create_subsets(n_events: usize, n_threads: usize) -> Vec<Range<usize>> {
    let n_threads = n_threads.max(1);
    let chunk = n_events.div_ceil(n_threads).max(1);
    (0..n_events)
        .step_by(chunk)
        .map(|start| start..(start + chunk).min(n_events))
        .collect()
}

/// The function to be called by a separate thread (typically the CLI).
///
/// Reads the event file, emulates every event on `config.n_threads` workers
/// and writes the trigger primitives to the output file, in event order.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    let input = config.get_input_file()?;
    let output = config.get_output_file()?;
    let emap = CsvElectronicsMap::new(config.emap_path.as_deref())?;
    let algo = TriggerPrimitiveAlgo::new(config.tpg.clone())?;

    log::info!("Reading events from {}...", input.to_string_lossy());
    let event_file = EventFile::read(input)?;
    log::info!("Emulating {} events...", event_file.len());

    let subsets = create_subsets(event_file.len(), config.n_threads);
    let results = std::thread::scope(|s| -> Result<Vec<EventResult>, ProcessorError> {
        let handles: Vec<_> = subsets
            .iter()
            .enumerate()
            .map(|(worker_id, range)| {
                let tx = tx.clone();
                let events = &event_file.events[range.clone()];
                let (config, algo, emap) = (&config, &algo, &emap);
                s.spawn(move || process_subset(config, algo, emap, events, &tx, worker_id))
            })
            .collect();

        let mut results = Vec::with_capacity(event_file.len());
        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(subset) => results.extend(subset?),
                Err(_) => return Err(ProcessorError::WorkerPanic(worker_id)),
            }
        }
        Ok(results)
    })?;

    let digi_count: usize = results.iter().map(|r| r.digis.len()).sum();
    let file = File::create(output)?;
    serde_yaml::to_writer(file, &ResultFile { events: results })?;
    log::info!(
        "Wrote {} trigger primitives to {}",
        digi_count,
        output.to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detid::{ChannelId, Subdetector};
    use crate::frame::{Frame, HbheFrame, QieSample};
    use std::path::PathBuf;
    use std::sync::mpsc::channel;

    fn pulse_event(number: u64) -> EventRecord {
        EventRecord {
            number,
            frames: vec![Frame::Hbhe(HbheFrame {
                id: ChannelId::new(Subdetector::Barrel, 5, 1, 1),
                presamples: 4,
                samples: [0, 0, 5, 20, 8, 0, 0, 0, 0, 0]
                    .iter()
                    .map(|a| QieSample { adc: *a, capid: 0 })
                    .collect(),
            })],
            raw: Vec::new(),
        }
    }

    #[test]
    fn test_create_subsets() {
        assert_eq!(create_subsets(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(create_subsets(2, 4), vec![0..1, 1..2]);
        assert_eq!(create_subsets(5, 0), vec![0..5]);
        assert!(create_subsets(0, 2).is_empty());
    }

    #[test]
    fn test_emulate_event() {
        let config = Config::default();
        let algo = TriggerPrimitiveAlgo::new(config.tpg.clone()).unwrap();
        let emap = CsvElectronicsMap::new(None).unwrap();
        let (tx, rx) = channel();
        let results =
            process_subset(&config, &algo, &emap, &[pulse_event(3), pulse_event(4)], &tx, 0)
                .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].number, 3);
        assert_eq!(results[0].digis.len(), 1);
        assert_eq!(results[0].diagnostics, 0);
        let last = rx.try_iter().last().unwrap();
        assert_eq!(last.events_done, 2);
        assert_eq!(last.progress, 1.0);
    }

    #[test]
    fn test_process_writes_results() {
        let dir = std::env::temp_dir();
        let input = dir.join(format!("hcal_tpg_events_{}.yaml", std::process::id()));
        let output: PathBuf = dir.join(format!("hcal_tpg_results_{}.yaml", std::process::id()));
        let events = EventFile {
            events: (0..5).map(pulse_event).collect(),
        };
        std::fs::write(&input, serde_yaml::to_string(&events).unwrap()).unwrap();

        let config = Config {
            input_path: input.clone(),
            output_path: output.clone(),
            n_threads: 2,
            ..Default::default()
        };
        let (tx, _rx) = channel();
        process(config, tx).unwrap();

        let written: ResultFile =
            serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let numbers: Vec<u64> = written.events.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3, 4]);
        assert!(written.events.iter().all(|e| e.digis.len() == 1));

        std::fs::remove_file(input).unwrap();
        std::fs::remove_file(output).unwrap();
    }
}
