//! shopsurfer - multi-agent shopping research assistant
//!
//! A query flows through four LLM agents in a fixed order:
//!
//! 1. **verify** - confirm exact model numbers and specifications
//! 2. **research** - retailers, reviews, stock, warranty and return policies
//! 3. **find deals** - current prices, promotion dates, terms, total cost
//! 4. **report** - the final shopping report shown to the user
//!
//! Each agent sees the outputs of every earlier stage. The first three may
//! call web tools (Serper search, website search, website scrape).
//!
//! # Quick Start
//!
//! ```no_run
//! use shopsurfer::config::ShopperConfig;
//! use shopsurfer::service::ShoppingService;
//!
//! # async fn example() {
//! let service = ShoppingService::from_config(ShopperConfig::default());
//! let report = service
//!     .search_products("sk-...", "serper-key", "Air fryer with digital controls")
//!     .await;
//! println!("{report}");
//! # }
//! ```

pub mod config;
pub mod crew;
pub mod error;
pub mod llm;
pub mod observability;
pub mod service;
pub mod testing;
pub mod tools;
pub mod web;

pub use config::{Credentials, ShopperConfig};
pub use error::{ShopperError, ShopperResult};
pub use service::{CrewFactory, HttpCrewFactory, ShoppingService};
pub use tools::{Tool, ToolDescription, ToolError, ToolKind};
