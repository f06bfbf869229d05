use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use larder_core::{AccountId, ItemId, RecipeId};
use larder_infra::{EngineConfig, InMemoryInventoryStore, InMemoryRecipeCatalog, InventoryService};
use larder_inventory::{
    ApplyReceipt, ConsumeRecipe, Ingredient, InventoryAccount, Location, OpenAccount, Recipe,
    Unit, UnitTable,
};

type Service = InventoryService<Arc<InMemoryInventoryStore>, Arc<InMemoryRecipeCatalog>>;

fn service() -> Service {
    InventoryService::new(
        Arc::new(InMemoryInventoryStore::new()),
        Arc::new(InMemoryRecipeCatalog::new()),
        UnitTable::default(),
        EngineConfig::default(),
    )
}

fn open(service: &Service, name: &str, location: Location, unit: &str) -> InventoryAccount {
    service
        .open_account(OpenAccount {
            account_id: AccountId::new(),
            item_id: ItemId::new(),
            item_name: name.to_string(),
            location,
            unit: Unit::new(unit),
            cost_scale: None,
            min_level: None,
            max_level: None,
        })
        .unwrap()
}

fn receipt(account_id: AccountId, quantity: Decimal, unit_cost: Decimal) -> ApplyReceipt {
    ApplyReceipt {
        account_id,
        quantity,
        unit_cost,
        reference: None,
        occurred_at: Utc::now(),
    }
}

fn bench_receipts(c: &mut Criterion) {
    let mut group = c.benchmark_group("receipts");

    for batch in [1u64, 10, 100] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let service = service();
            let account = open(&service, "Beras", Location::Warehouse, "kg");
            b.iter(|| {
                for i in 0..batch {
                    let cost = Decimal::from(15_000 + (i % 7) as i64);
                    black_box(
                        service
                            .apply_receipt(receipt(account.id_typed(), dec!(1), cost))
                            .unwrap(),
                    );
                }
            });
        });
    }

    group.finish();
}

fn bench_consumption(c: &mut Criterion) {
    let mut group = c.benchmark_group("consumption");

    for ingredients in [1usize, 5, 20] {
        group.throughput(Throughput::Elements(ingredients as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(ingredients),
            &ingredients,
            |b, &ingredients| {
                let service = service();
                let kitchen = Location::department("main-kitchen");
                let lines: Vec<Ingredient> = (0..ingredients)
                    .map(|i| {
                        let account = open(&service, &format!("item-{i}"), kitchen.clone(), "g");
                        service
                            .apply_receipt(receipt(account.id_typed(), dec!(1000000000), dec!(15)))
                            .unwrap();
                        Ingredient {
                            account_id: account.id_typed(),
                            quantity_per_serving: dec!(25),
                            unit: Unit::new("g"),
                        }
                    })
                    .collect();
                let recipe = Recipe::new(RecipeId::new(), "Nasi Goreng", lines).unwrap();
                let recipe_id = recipe.id();
                service.catalog().register(recipe).unwrap();

                b.iter(|| {
                    black_box(
                        service
                            .consume(ConsumeRecipe {
                                recipe_id,
                                servings: 1,
                                location: kitchen.clone(),
                                reference: None,
                                occurred_at: Utc::now(),
                            })
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_receipts, bench_consumption);
criterion_main!(benches);
