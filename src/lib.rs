// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Palette extraction and color sampling over short-lived image sessions.
//!
//! An upload is decoded once into an upright RGBA buffer, its dominant color and palette are
//! extracted, and the buffer is cached behind an opaque token. Later requests sample colors at
//! arbitrary points of the image by token until the session expires or is closed.
//!
//! Palette extraction is tiered. The library tier is a median cut quantizer in the manner of the
//! Palette library in Android Jetpack, which is Copyright 2018 The Android Open Source Project and
//! licensed under the Apache License, Version 2.0. When it is unavailable or fails, a statistical
//! tier averages the image and walks a coarse grid, and a static gray ramp is the last resort.
//!
//! ```no_run
//! use palette_sampler::{CoordinateUnit, CreateOptions, SamplerConfig, SamplerService};
//!
//! # fn main() -> palette_sampler::Result<()> {
//! let service = SamplerService::new(SamplerConfig::default())?;
//! let bytes = std::fs::read("photo.jpg").unwrap_or_default();
//!
//! let created = service.create_session(&bytes, "image/jpeg", CreateOptions::default())?;
//! println!("dominant {}", created.dominant);
//!
//! let sample = service.sample_color(&created.token, 0.5, 0.5, CoordinateUnit::Normalized, Some(4))?;
//! println!("center {}", sample.hex());
//!
//! service.close_session(&created.token);
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod logging;
pub mod normalize;
pub mod sampler;
pub mod service;
pub mod store;

pub use crate::{
    color::Rgb,
    config::SamplerConfig,
    error::{Error, ErrorKind, Result},
    extract::{PaletteExtractor, PaletteResult, PaletteSource, PaletteStrategy},
    logging::{init_logging, LogConfig, LogFormat},
    sampler::{ColorSample, CoordinateUnit},
    service::{CloseOutcome, CreateOptions, CreatedSession, SamplerService, SamplerServiceBuilder},
    store::{Clock, ManualClock, StoreStats, SystemClock},
};
pub use image;
pub use palette;
