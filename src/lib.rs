//! # Showroom
//!
//! A dealership lead-management backend with a retrieval-augmented reply
//! layer for customer SMS and chat messages.
//!
//! Showroom stores leads, their conversation threads and each dealership's
//! vehicle inventory in SQLite, and answers customer messages by retrieving
//! matching vehicles and prompting a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌──────────┐
//! │  entity  │──▶│  filter  │──▶│    store    │──▶│  prompt  │──▶│   llm    │
//! │  parse   │   │ SQL+mem  │   │ filter+rank │   │ few-shot │   │ validate │
//! └──────────┘   └──────────┘   └──────┬──────┘   └──────────┘   └────┬─────┘
//!                                      │                              │
//!                               ┌──────┴──────┐                ┌──────┴──────┐
//!                               │   SQLite    │                │  respond    │
//!                               │ inventory + │                │ (templates  │
//!                               │ embeddings  │                │  fallback)  │
//!                               └─────────────┘                └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! showroom init                          # create database
//! showroom inventory add --dealership d1 --make Honda --model Civic --year 2022 --price '$21,000'
//! showroom embed pending                 # generate embeddings
//! showroom respond "any civics under 25k?" --dealership d1
//! showroom serve                         # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Leads, conversations, vehicles and payloads |
//! | [`entity`] | Free-text message → [`entity::VehicleQuery`] |
//! | [`filter`] | Query → SQL and in-memory predicates |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Filtered vector search over inventory |
//! | [`retrieval`] | Hybrid retrieval with threshold and top-k |
//! | [`prompt`] | Grounded and generic prompt construction |
//! | [`context`] | Conversation intent, urgency and budget analysis |
//! | [`llm`] | Chat completion providers |
//! | [`validation`] | Quality gate for generated replies |
//! | [`respond`] | End-to-end reply generation |
//! | [`leads`], [`conversations`], [`inventory`] | CRUD |
//! | [`indexer`] | Embedding build and coverage |
//! | [`classify`] | Time-based lead classification |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classify;
pub mod commands;
pub mod config;
pub mod context;
pub mod conversations;
pub mod db;
pub mod embedding;
pub mod entity;
pub mod error;
pub mod filter;
pub mod indexer;
pub mod inventory;
pub mod leads;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod openai;
pub mod prompt;
pub mod respond;
pub mod retrieval;
pub mod server;
pub mod stats;
pub mod store;
pub mod validation;
