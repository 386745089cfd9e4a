/// Data layer: core types, loading, filtering and scaling.
///
/// Architecture:
/// ```text
///  features.parquet        train.csv / evaluate.csv
///        │                         │
///        ▼                         ▼
///   ┌──────────┐             ┌──────────┐
///   │  loader   │             │  loader   │  read_metadata → audio names
///   └──────────┘             └──────────┘
///        │                         │
///        ▼                         │
///   ┌──────────────┐               │
///   │ FeatureTable  │  names, features, targets, source labels
///   └──────────────┘               │
///        │                         ▼
///        │                   ┌──────────┐
///        └─────────────────▶ │  filter   │  names → row indexes, source filter
///                            └──────────┘
///                                  │
///                                  ▼
///                            ┌──────────┐
///                            │  scaler   │  normalize rows, one-hot targets
///                            └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod scaler;
