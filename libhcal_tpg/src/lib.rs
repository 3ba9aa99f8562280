//! # hcal_tpg
//!
//! hcal_tpg is an emulator of the HCAL trigger primitive generator, written in Rust. It
//! takes the digitized frames of the barrel (HB), endcap (HE) and forward (HF)
//! calorimeters for an event and produces the trigger primitives the front-end firmware
//! would have sent to the trigger: one compressed transverse-energy word and a pair of
//! fine-grain bits per output time slice, for every trigger tower that saw a frame.
//!
//! Both the legacy (QIE8) front ends and the upgraded ones (QIE11 in the barrel/endcap,
//! dual-anode QIE10 in the forward calorimeter) are supported, and the two may be mixed
//! within an event. The analysis applied to a tower is chosen from the tower's format
//! version and the upgrade flags of the configuration.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./hcal_tpg_cli` from the top
//! level hcal_tpg repository. The binary is installed to your cargo install location
//! (typically something like `~/.cargo/bin/`) and can be removed with
//! `cargo uninstall hcal_tpg_cli`.
//!
//! ## Documentation
//!
//! Documentation is provided for the `libhcal_tpg` library. The entry point is
//! [`algo::TriggerPrimitiveAlgo`]; [`process::process`] shows how an event file is
//! driven through it. The source code of `hcal_tpg_cli` should be examined for an
//! example of using the library from an application.
//!
//! ## Configuration
//!
//! A configuration file can be generated with `hcal_tpg_cli new -p config.yml`. The
//! YAML format of a configuration file is as follows:
//!
//! ```yml
//! input_path: None
//! output_path: None
//! emap_path: null
//! run_zs: true
//! run_fe_format_error: true
//! geometry:
//!   rct: true
//!   one_by_one: true
//! coder:
//!   gain: 1.0
//!   pedestal: 0
//!   upgrade_fg_thresholds: [12, 48]
//! compressor:
//!   shift: 0
//! feature_bit: null
//! n_threads: 1
//! tpg:
//!   peak_finding: true
//!   weights: [1.0, 1.0]
//!   fg_threshold: 12
//!   fg_hf_threshold: 17
//!   zs_threshold: 1.0
//!   number_of_samples: 4
//!   number_of_presamples: 2
//!   number_of_samples_hf: 4
//!   number_of_presamples_hf: 2
//!   min_signal_threshold: 0
//!   pmt_noise_threshold: 0
//!   peak_finder_algorithm: 2
//!   nct_scale_shift: 2
//!   rct_scale_shift: 3
//!   upgrade: {hb: false, he: false, hf: false}
//!   tower_split_weight: 0.5
//!   hf_parameters:
//!     hf_tdc_mask: 18446744073709551615
//!     hf_adc_threshold: 255
//!     hf_fg_threshold: 17
//!   override_parameters: null
//! ```
//!
//! Any field of the `tpg` block may be left out, in which case the default above is used.
//! Note that if the `emap_path` field is set to `null`, the bundled default electronics map
//! will be used. `n_threads` is the number of worker threads the events are divided
//! amongst; only workers that would get events are created.
//!
//! ### Electronics Map Format
//!
//! The electronics map is a CSV file with *no* whitespaces and a header row. The columns
//! are as follows:
//!
//! ```csv
//! crate,slot,tb,fiber,fiber_chan,subdet,ieta,iphi,depth
//! ```
//!
//! The first five columns locate an HTR fiber channel, the last four name the detector
//! channel read out there. Supported subdetector keywords are `HB`, `HE`, `HO` and `HF`.
//! The map is only used to find the towers touched by front-end format errors.
//!
//! ## Input
//!
//! The event file is YAML: a list of events, each with a number, its frames and optionally
//! the raw FED payloads of the HCAL readout.
//!
//! ```yml
//! events:
//!   - number: 1
//!     frames:
//!       - kind: hbhe
//!         id: {subdet: Barrel, ieta: 3, iphi: 5, depth: 1}
//!         presamples: 4
//!         samples: [{adc: 0}, {adc: 3}, {adc: 30}, {adc: 9}]
//!       - kind: qie10
//!         id: {subdet: Forward, ieta: 33, iphi: 1, depth: 1}
//!         presamples: 2
//!         samples: [{adc: 4, le_tdc: 3}, {adc: 40, le_tdc: 10, ok: true}]
//!     raw:
//!       - fed_id: 700
//!         data: [...]
//! ```
//!
//! ## Output
//!
//! The output is a YAML file with one entry per event, in the order of the input: the
//! trigger primitive digis (tower id, presamples and the output slices), the number of
//! towers that could not be analysed, the number of vetoed forward slices and the number
//! of digis flagged with a front-end format error. Towers that could not be analysed are
//! reported as warnings in the terminal.
pub mod accumulator;
pub mod algo;
pub mod coder;
pub mod config;
pub mod constants;
pub mod detid;
pub mod digi;
pub mod electronics_map;
pub mod error;
pub mod event;
pub mod finegrain;
pub mod frame;
pub mod geometry;
pub mod peak;
pub mod process;
pub mod raw_data;
pub mod veto;
pub mod worker_status;
