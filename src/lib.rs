//! Leptos client-side app: animated route maps for fleet routing and supply chain flows.

use leptos::prelude::*;
use leptos_meta::*;
use leptos_router::components::*;
use leptos_router::path;
use log::{Level, info};

// Modules
mod components;
mod pages;

// Top-Level pages
use crate::pages::fleet::FleetRouting;
use crate::pages::not_found::NotFound;
use crate::pages::supply_chain::SupplyChain;

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("Logging initialized");
}

/// An app router with the two map pages and a 404 fallback
#[component]
pub fn App() -> impl IntoView {
	// Provides context that manages stylesheets, titles, meta tags, etc.
	provide_meta_context();

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />

		// sets the document title
		<Title text="Route Map" />

		// injects metadata in the <head> of the page
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<Router>
			<nav class="main-nav">
				<A href="/">"Fleet Routing"</A>
				<A href="/supply-chain">"Supply Chain"</A>
			</nav>
			<main>
				<Routes fallback=|| view! { <NotFound /> }>
					<Route path=path!("/") view=FleetRouting />
					<Route path=path!("/supply-chain") view=SupplyChain />
				</Routes>
			</main>
		</Router>
	}
}
