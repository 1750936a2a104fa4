//! Query construction for ride listings.
//!
//! Raw request parameters are turned into a [`RideQuery`]: an ordered list of
//! optional filters, a sort, and a page. Parsing never fails. Inputs that
//! cannot be understood are dropped and the defaults apply.

use serde::{Deserialize, Serialize};

// ─── Pagination ──────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page of a fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
  /// Build from raw `page` / `page_size` values. Unparseable or zero values
  /// fall back to the defaults; `page_size` is clamped to [`MAX_PAGE_SIZE`].
  pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Self {
    let positive = |raw: Option<&str>| {
      raw
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
    };
    Self {
      page:      positive(page).unwrap_or(1),
      page_size: positive(page_size)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE),
    }
  }

  pub fn first(page_size: u32) -> Self { Self { page: 1, page_size } }

  pub fn limit(&self) -> u64 { u64::from(self.page_size) }

  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
  }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  /// Total matching items across all pages.
  pub count:    u64,
  pub next:     Option<u32>,
  pub previous: Option<u32>,
  pub results:  Vec<T>,
}

impl<T> Page<T> {
  pub fn new(request: PageRequest, count: u64, results: Vec<T>) -> Self {
    let seen = request.offset() + request.limit();
    Self {
      count,
      next: (seen < count).then(|| request.page + 1),
      previous: (request.page > 1).then(|| request.page - 1),
      results,
    }
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      count:    self.count,
      next:     self.next,
      previous: self.previous,
      results:  self.results.into_iter().map(f).collect(),
    }
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// A single optional restriction on the ride set. Filters are applied in the
/// order they appear in [`RideQuery::filters`].
#[derive(Debug, Clone, PartialEq)]
pub enum RideFilter {
  /// Exact match on the stored status. Holds the uppercased input, which may
  /// not name any real status, in which case nothing matches.
  Status(String),
  /// Case-insensitive substring of the rider's email.
  RiderEmailContains(String),
}

// ─── Ordering ────────────────────────────────────────────────────────────────

/// Ride columns a caller may order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
  PickupTime,
  CreatedAt,
  UpdatedAt,
}

impl OrderField {
  pub fn parse(name: &str) -> Option<Self> {
    match name {
      "pickup_time" => Some(Self::PickupTime),
      "created_at" => Some(Self::CreatedAt),
      "updated_at" => Some(Self::UpdatedAt),
      _ => None,
    }
  }

  pub fn column(self) -> &'static str {
    match self {
      Self::PickupTime => "pickup_time",
      Self::CreatedAt => "created_at",
      Self::UpdatedAt => "updated_at",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
  pub field:      OrderField,
  pub descending: bool,
}

impl OrderBy {
  pub const DEFAULT: Self =
    Self { field: OrderField::CreatedAt, descending: true };

  /// Parse a comma-separated ordering such as `-pickup_time,created_at`.
  /// Unknown fields are skipped; an empty result means "use the default".
  pub fn parse_list(raw: &str) -> Vec<Self> {
    raw
      .split(',')
      .map(str::trim)
      .filter_map(|term| {
        let (descending, name) = match term.strip_prefix('-') {
          Some(rest) => (true, rest),
          None => (false, term),
        };
        OrderField::parse(name).map(|field| Self { field, descending })
      })
      .collect()
  }
}

/// A point to measure planar distance from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Origin {
  pub lat: f64,
  pub lng: f64,
}

impl Origin {
  /// Euclidean distance in degree space. Not geodesic.
  pub fn distance_to(&self, lat: f64, lng: f64) -> f64 {
    ((lat - self.lat).powi(2) + (lng - self.lng).powi(2)).sqrt()
  }
}

/// How to order the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RideSort {
  /// When set, rides are ordered by ascending distance to this point first.
  pub distance_from: Option<Origin>,
  /// Never empty.
  pub order_by:      Vec<OrderBy>,
}

impl Default for RideSort {
  fn default() -> Self {
    Self { distance_from: None, order_by: vec![OrderBy::DEFAULT] }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Raw, untrusted list parameters exactly as they arrived.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideListParams {
  pub status:           Option<String>,
  pub rider_email:      Option<String>,
  pub lat:              Option<String>,
  pub lng:              Option<String>,
  pub sort_by_distance: Option<String>,
  pub ordering:         Option<String>,
  pub page:             Option<String>,
  pub page_size:        Option<String>,
}

/// A fully-resolved ride listing request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RideQuery {
  pub filters: Vec<RideFilter>,
  pub sort:    RideSort,
  pub page:    PageRequest,
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
  raw.as_deref().filter(|s| !s.is_empty())
}

fn finite(raw: &str) -> Option<f64> {
  raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl RideQuery {
  /// Resolve raw parameters. Builders run in a fixed order:
  /// status, then rider email, then distance sort.
  pub fn from_params(params: &RideListParams) -> Self {
    let mut filters = Vec::new();

    if let Some(status) = non_empty(&params.status) {
      filters.push(RideFilter::Status(status.to_uppercase()));
    }

    if let Some(email) = non_empty(&params.rider_email) {
      filters.push(RideFilter::RiderEmailContains(email.to_owned()));
    }

    let distance_from = match (
      non_empty(&params.lat),
      non_empty(&params.lng),
      non_empty(&params.sort_by_distance),
    ) {
      (Some(lat), Some(lng), Some(_)) => match (finite(lat), finite(lng)) {
        (Some(lat), Some(lng)) => Some(Origin { lat, lng }),
        _ => {
          tracing::debug!(lat, lng, "ignoring unparseable distance origin");
          None
        }
      },
      _ => None,
    };

    let mut order_by = params
      .ordering
      .as_deref()
      .map(OrderBy::parse_list)
      .unwrap_or_default();
    if order_by.is_empty() {
      order_by.push(OrderBy::DEFAULT);
    }

    Self {
      filters,
      sort: RideSort { distance_from, order_by },
      page: PageRequest::parse(
        params.page.as_deref(),
        params.page_size.as_deref(),
      ),
    }
  }

  /// The default ordering over the first `n` rides, with no filters.
  pub fn first(n: u32) -> Self {
    Self { page: PageRequest::first(n), ..Self::default() }
  }
}
