//! Wishlist batch enrichment: stamps each wishlist item with the best
//! current discount using exactly two catalog round trips, regardless of
//! list size.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::CatalogService;
use crate::domain::WishlistItem;

pub struct WishlistEnrichmentEngine {
    catalog: Arc<dyn CatalogService>,
}

impl WishlistEnrichmentEngine {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        WishlistEnrichmentEngine { catalog }
    }

    /// Enrich `items` with `best_deal_percentage`.
    ///
    /// Two batch calls total: one title-to-id lookup, one price fetch. An
    /// item whose title resolves to nothing, or whose id has no deals,
    /// passes through unchanged. Either batch failing degrades the whole
    /// list to pass-through; enrichment never costs the caller the list.
    pub async fn enrich(&self, items: Vec<WishlistItem>) -> Vec<WishlistItem> {
        if items.is_empty() {
            return items;
        }

        // One entry per distinct title; duplicates share the lookup result.
        let mut seen = HashSet::new();
        let titles: Vec<String> = items
            .iter()
            .map(|i| i.title.clone())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        let ids_by_title = match self.catalog.lookup_ids_by_titles(&titles).await {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "wishlist title lookup failed; returning list unenriched");
                return items;
            }
        };
        if ids_by_title.is_empty() {
            return items;
        }

        let catalog_ids: Vec<String> = ids_by_title.values().cloned().collect();
        let prices = match self.catalog.get_prices_batch(&catalog_ids).await {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "wishlist price fetch failed; returning list unenriched");
                return items;
            }
        };

        items
            .into_iter()
            .map(|mut item| {
                let best = ids_by_title
                    .get(&item.title)
                    .and_then(|id| prices.get(id))
                    .and_then(|deals| {
                        // Highest cut wins; ties keep the earliest deal.
                        deals
                            .iter()
                            .map(|d| d.discount_percentage)
                            .fold(None, |acc: Option<u8>, cut| match acc {
                                Some(best) if best >= cut => Some(best),
                                _ => Some(cut),
                            })
                    });
                if best.is_some() {
                    item.best_deal_percentage = best;
                }
                item
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{arc, deal, CountingCatalog};

    fn item(title: &str) -> WishlistItem {
        WishlistItem::new(title.to_lowercase().replace(' ', "-"), title)
    }

    // Scenario E: three items, one resolvable, one unknown title, one with
    // no deals. Exactly two catalog calls regardless.
    #[tokio::test]
    async fn enriches_resolvable_items_in_two_round_trips() {
        let catalog = arc(
            CountingCatalog::default()
                .with_title_id("Celeste", "itad-celeste")
                .with_title_id("Tunic", "itad-tunic")
                .with_prices(
                    "itad-celeste",
                    vec![deal("Steam", 4.99, 19.99, 75), deal("GOG", 9.99, 19.99, 50)],
                ),
        );
        let engine = WishlistEnrichmentEngine::new(catalog.clone());

        let enriched = engine
            .enrich(vec![item("Celeste"), item("Obscure Title"), item("Tunic")])
            .await;
        assert_eq!(enriched[0].best_deal_percentage, Some(75));
        assert_eq!(enriched[1].best_deal_percentage, None);
        assert_eq!(enriched[2].best_deal_percentage, None);
        assert_eq!(catalog.total_calls(), 2);
    }

    #[tokio::test]
    async fn batch_failure_returns_input_unchanged() {
        let engine = WishlistEnrichmentEngine::new(arc(CountingCatalog::default().failing()));

        let input = vec![item("Celeste"), item("Tunic")];
        let out = engine.enrich(input.clone()).await;
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn empty_list_makes_no_catalog_calls() {
        let catalog = arc(CountingCatalog::default());
        let engine = WishlistEnrichmentEngine::new(catalog.clone());

        assert!(engine.enrich(Vec::new()).await.is_empty());
        assert_eq!(catalog.total_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_titles_are_looked_up_once() {
        let catalog = arc(
            CountingCatalog::default()
                .with_title_id("Celeste", "itad-celeste")
                .with_prices("itad-celeste", vec![deal("Steam", 4.99, 19.99, 75)]),
        );
        let engine = WishlistEnrichmentEngine::new(catalog.clone());

        let out = engine
            .enrich(vec![item("Celeste"), item("Celeste"), item("Tunic")])
            .await;
        // Both duplicates share the one lookup result.
        assert_eq!(out[0].best_deal_percentage, Some(75));
        assert_eq!(out[1].best_deal_percentage, Some(75));

        let batches = catalog.title_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec!["Celeste".to_string(), "Tunic".to_string()]);
    }

    #[tokio::test]
    async fn tie_keeps_first_deal_value() {
        let catalog = arc(
            CountingCatalog::default()
                .with_title_id("Hades", "itad-hades")
                .with_prices(
                    "itad-hades",
                    vec![deal("Steam", 12.49, 24.99, 50), deal("Epic", 12.49, 24.99, 50)],
                ),
        );
        let engine = WishlistEnrichmentEngine::new(catalog);

        let out = engine.enrich(vec![item("Hades")]).await;
        assert_eq!(out[0].best_deal_percentage, Some(50));
    }
}
