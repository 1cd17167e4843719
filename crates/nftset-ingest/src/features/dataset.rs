//! Dataset rows
//!
//! A row joins selected event columns with the image's metadata and its
//! statistics bundle. Channel slots are named r, g, b (and a for extrema)
//! and are filled in channel order; slots past the image's channel count
//! hold an empty cell, which is distinct from a zero statistic.

use super::image::{format_name, ColorMode, DecodedImage};
use super::stats::{ImageStats, HISTOGRAM_LEN};
use crate::event::{AssetRef, EventRow, PaymentToken};

/// Channel slots of the moment statistics
const MOMENT_SLOTS: [&str; 3] = ["r", "g", "b"];

/// Channel slots of the extrema
const EXTREMA_SLOTS: [&str; 4] = ["r", "g", "b", "a"];

/// Metadata read from the image file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMeta {
    pub mode: ColorMode,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub is_animated: bool,
    pub n_frames: u32,
}

impl ImageMeta {
    pub fn of(image: &DecodedImage) -> Self {
        Self {
            mode: image.mode(),
            width: image.width(),
            height: image.height(),
            format: format_name(image.format),
            is_animated: image.is_animated(),
            n_frames: image.frames,
        }
    }
}

/// One row of the dataset table
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub asset_id: String,
    pub is_private: String,
    pub starting_price: String,
    pub ending_price: String,
    pub total_price: String,
    pub payment: PaymentToken,
    pub auction_type: String,
    pub quantity: String,
    pub asset_bundle: String,
    pub num_sales: Option<u64>,
    pub background_color: Option<String>,
    pub image: ImageMeta,
    pub stats: ImageStats,
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl DatasetRow {
    pub fn new(
        asset: &AssetRef,
        event: &EventRow,
        payment: PaymentToken,
        image: &DecodedImage,
    ) -> Self {
        let stats = ImageStats::from_samples(&image.samples_u8(), image.channel_count());

        Self {
            asset_id: asset.id.clone(),
            is_private: event.is_private.clone(),
            starting_price: event.starting_price.clone(),
            ending_price: event.ending_price.clone(),
            total_price: event.total_price.clone(),
            payment,
            auction_type: event.auction_type.clone(),
            quantity: event.quantity.clone(),
            asset_bundle: event.asset_bundle.clone(),
            num_sales: asset.num_sales,
            background_color: asset.background_color.clone(),
            image: ImageMeta::of(image),
            stats,
        }
    }

    /// Visit every column in output order
    fn columns(&self, mut emit: impl FnMut(&str, String)) {
        emit("id", self.asset_id.clone());
        emit("is_private", self.is_private.clone());
        emit("starting_price", self.starting_price.clone());
        emit("ending_price", self.ending_price.clone());
        emit("total_price", self.total_price.clone());
        emit("payment_symbol", self.payment.symbol.clone());
        emit("payment_decimals", self.payment.decimals.to_string());
        emit("payment_eth_price", self.payment.eth_price.to_string());
        emit("payment_usd_price", self.payment.usd_price.to_string());
        emit("auction_type", self.auction_type.clone());
        emit("quantity", self.quantity.clone());
        emit("asset_bundle", self.asset_bundle.clone());
        emit("num_sales", opt(self.num_sales));
        emit("background_color", self.background_color.clone().unwrap_or_default());
        emit("mode", self.image.mode.to_string());

        let stats = &self.stats;
        let moments: [(&str, fn(&super::stats::ChannelStats) -> String); 8] = [
            ("pixel_count", |c| c.count.to_string()),
            ("pixel_sum", |c| c.sum.to_string()),
            ("pixel_sum2", |c| c.sum2.to_string()),
            ("pixel_mean", |c| c.mean.to_string()),
            ("pixel_median", |c| c.median.to_string()),
            ("rms", |c| c.rms.to_string()),
            ("var", |c| c.var.to_string()),
            ("stddev", |c| c.stddev.to_string()),
        ];
        for (name, value) in moments {
            for (index, slot) in MOMENT_SLOTS.iter().enumerate() {
                emit(&format!("{}_{}", slot, name), opt(stats.channel(index).map(value)));
            }
        }

        for (index, slot) in EXTREMA_SLOTS.iter().enumerate() {
            let channel = stats.channel(index);
            emit(&format!("{}_pixel_min", slot), opt(channel.map(|c| c.min)));
            emit(&format!("{}_pixel_max", slot), opt(channel.map(|c| c.max)));
        }

        emit("entropy", stats.entropy.to_string());
        emit("width", self.image.width.to_string());
        emit("height", self.image.height.to_string());
        emit("format", self.image.format.clone());
        emit("is_animated", u8::from(self.image.is_animated).to_string());
        emit("n_frames", self.image.n_frames.to_string());

        for (index, count) in stats.padded_histogram().into_iter().enumerate() {
            emit(&format!("histogram{}", index), count.to_string());
        }
    }

    /// Column names in output order
    pub fn header(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(64 + HISTOGRAM_LEN);
        self.columns(|name, _| names.push(name.to_string()));
        names
    }

    /// Cell values in output order
    pub fn record(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(64 + HISTOGRAM_LEN);
        self.columns(|_, value| cells.push(value));
        cells
    }
}
