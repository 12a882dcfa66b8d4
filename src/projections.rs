use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::StatsError;


/// One row of the cleaned listings CSV, reduced to the columns the statistics use
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRecord {
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub host_id: Option<u64>,
    pub neighbourhood_cleansed: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub room_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub accommodates: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub review_scores_rating: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub review_scores_location: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub host_is_superhost: Option<String>,
}

impl ListingRecord {
    fn is_superhost(&self) -> Option<bool> {
        match self.host_is_superhost.as_deref()?.trim() {
            "t" | "true" | "1" => Some(true),
            "f" | "false" | "0" => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub listings: usize,
    pub neighbourhoods: usize,
    pub mean_price: Option<f64>,
    pub superhost_percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct NeighbourhoodSummary {
    pub neighbourhood: String,
    pub listings: usize,
    pub mean_price: Option<f64>,
    pub mean_rating: Option<f64>,
    pub mean_location_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AccommodatesCount {
    pub accommodates: u32,
    pub listings: usize,
}

#[derive(Debug, Serialize)]
pub struct RoomTypeCount {
    pub property_type: String,
    pub room_type: String,
    pub listings: usize,
}

#[derive(Debug, Serialize)]
pub struct HostCount {
    pub host_id: u64,
    pub listings: usize,
    pub percentage: f64,
    /// `None` when none of the host's listings carries the flag
    pub superhost: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RatingPrice {
    pub rating: f64,
    pub mean_price: f64,
}

/// Mean price per general score, cheapest first, plus the overall mean
#[derive(Debug, Serialize)]
pub struct PriceByRating {
    pub mean_price: Option<f64>,
    pub ratings: Vec<RatingPrice>,
}

/// Listings loaded once at startup; every aggregation reads this snapshot
#[derive(Debug)]
pub struct ListingsDataset {
    path: PathBuf,
    records: Vec<ListingRecord>,
}

impl ListingsDataset {
    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let load_err = |reason: String| StatsError::Load {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = csv::Reader::from_path(path).map_err(|e| load_err(e.to_string()))?;
        let mut records = Vec::new();
        for (idx, row) in reader.deserialize::<ListingRecord>().enumerate() {
            let record = row.map_err(|e| load_err(format!("row {}: {}", idx + 1, e)))?;
            records.push(record);
        }

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn overview(&self) -> Overview {
        let neighbourhoods = self
            .records
            .iter()
            .map(|r| r.neighbourhood_cleansed.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        let flags: Vec<bool> = self.records.iter().filter_map(|r| r.is_superhost()).collect();
        let superhost_percentage = if flags.is_empty() {
            None
        } else {
            Some(percentage(flags.iter().filter(|f| **f).count(), flags.len()))
        };

        Overview {
            listings: self.records.len(),
            neighbourhoods,
            mean_price: mean(self.records.iter().filter_map(|r| r.price)),
            superhost_percentage,
        }
    }

    pub fn neighbourhoods(&self) -> Vec<NeighbourhoodSummary> {
        let mut groups: HashMap<&str, Vec<&ListingRecord>> = HashMap::new();
        for record in &self.records {
            groups
                .entry(record.neighbourhood_cleansed.as_str())
                .or_default()
                .push(record);
        }

        let mut summary: Vec<NeighbourhoodSummary> = groups
            .into_iter()
            .map(|(name, rows)| NeighbourhoodSummary {
                neighbourhood: name.to_string(),
                listings: rows.len(),
                mean_price: mean(rows.iter().filter_map(|r| r.price)),
                mean_rating: mean(rows.iter().filter_map(|r| r.review_scores_rating)),
                mean_location_score: mean(rows.iter().filter_map(|r| r.review_scores_location)),
            })
            .collect();

        summary.sort_by(|a, b| {
            b.listings
                .cmp(&a.listings)
                .then_with(|| a.neighbourhood.cmp(&b.neighbourhood))
        });
        summary
    }

    pub fn accommodates_distribution(&self) -> Vec<AccommodatesCount> {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for accommodates in self.records.iter().filter_map(|r| r.accommodates) {
            *counts.entry(accommodates).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(accommodates, listings)| AccommodatesCount {
                accommodates,
                listings,
            })
            .collect()
    }

    pub fn room_types(&self) -> Vec<RoomTypeCount> {
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for record in &self.records {
            if let (Some(property), Some(room)) = (&record.property_type, &record.room_type) {
                *counts.entry((property.as_str(), room.as_str())).or_insert(0) += 1;
            }
        }

        let mut rooms: Vec<RoomTypeCount> = counts
            .into_iter()
            .map(|((property_type, room_type), listings)| RoomTypeCount {
                property_type: property_type.to_string(),
                room_type: room_type.to_string(),
                listings,
            })
            .collect();

        rooms.sort_by(|a, b| {
            b.listings
                .cmp(&a.listings)
                .then_with(|| a.property_type.cmp(&b.property_type))
                .then_with(|| a.room_type.cmp(&b.room_type))
        });
        rooms
    }

    pub fn price_by_rating(&self) -> PriceByRating {
        let mut groups: HashMap<u64, (f64, Vec<f64>)> = HashMap::new();
        for record in &self.records {
            if let (Some(rating), Some(price)) = (record.review_scores_rating, record.price) {
                groups
                    .entry(rating.to_bits())
                    .or_insert_with(|| (rating, Vec::new()))
                    .1
                    .push(price);
            }
        }

        let mut ratings: Vec<RatingPrice> = groups
            .into_values()
            .filter_map(|(rating, prices)| {
                mean(prices.into_iter()).map(|mean_price| RatingPrice { rating, mean_price })
            })
            .collect();
        ratings.sort_by(|a, b| {
            a.mean_price
                .total_cmp(&b.mean_price)
                .then_with(|| a.rating.total_cmp(&b.rating))
        });

        PriceByRating {
            mean_price: mean(self.records.iter().filter_map(|r| r.price)),
            ratings,
        }
    }

    /// Hosts with the most listings, ties broken by host id
    pub fn top_hosts(&self, limit: usize) -> Vec<HostCount> {
        let mut counts: HashMap<u64, (usize, Option<bool>)> = HashMap::new();
        for record in &self.records {
            let Some(host_id) = record.host_id else {
                continue;
            };
            let entry = counts.entry(host_id).or_insert((0, None));
            entry.0 += 1;
            entry.1 = entry.1.or(record.is_superhost());
        }

        let total = self.records.len();
        let mut hosts: Vec<HostCount> = counts
            .into_iter()
            .map(|(host_id, (listings, superhost))| HostCount {
                host_id,
                listings,
                percentage: percentage(listings, total),
                superhost,
            })
            .collect();

        hosts.sort_by(|a, b| b.listings.cmp(&a.listings).then_with(|| a.host_id.cmp(&b.host_id)));
        hosts.truncate(limit);
        hosts
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
