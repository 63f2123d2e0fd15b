//! Constructor dependencies: tier routing, reuse sets, optional and ignored
//! parameters, cycles and the single-tier model.

use std::sync::Arc;

use strata_container::prelude::*;

// ============================================================
// Three-tier graph
// ============================================================

trait DbContext: Send + Sync {
    fn connection(&self) -> &'static str;
}

trait Repository: Send + Sync {
    fn context(&self) -> Arc<dyn DbContext>;
}

trait Customer: Send + Sync {
    fn repository(&self) -> Arc<dyn Repository>;
}

#[derive(Default)]
struct SqlContext;

impl DbContext for SqlContext {
    fn connection(&self) -> &'static str {
        "sql"
    }
}

impl Injectable for SqlContext {
    const REUSABLE: bool = true;

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_new()]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn DbContext>(|s| s);
    }
}

struct SqlRepository {
    context: Arc<dyn DbContext>,
}

impl Repository for SqlRepository {
    fn context(&self) -> Arc<dyn DbContext> {
        self.context.clone()
    }
}

impl Injectable for SqlRepository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(SqlRepository { context: args.required()? }))
            .param(Parameter::of::<dyn DbContext>("context"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Repository>(|s| s);
    }
}

struct RetailCustomer {
    repository: Arc<dyn Repository>,
}

impl Customer for RetailCustomer {
    fn repository(&self) -> Arc<dyn Repository> {
        self.repository.clone()
    }
}

impl Injectable for RetailCustomer {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(RetailCustomer { repository: args.required()? }))
            .param(Parameter::of::<dyn Repository>("repository"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Customer>(|s| s);
    }
}

fn three_tiers() -> Container {
    let container = Container::builder()
        .options(ServiceOptions::new().dependencies(DependencyOptions::new("Repositories")))
        .build()
        .unwrap();
    container.root().add::<dyn Customer, RetailCustomer>().unwrap();
    container
        .dependency_tier("Repositories")
        .unwrap()
        .add::<dyn Repository, SqlRepository>()
        .unwrap();
    container.shared().add::<dyn DbContext, SqlContext>().unwrap();
    container
}

#[test]
fn customer_resolves_through_every_tier() {
    let container = three_tiers();

    let a = container.get_service::<dyn Customer>().unwrap();
    let b = container.get_service::<dyn Customer>().unwrap();
    assert_eq!(a.repository().context().connection(), "sql");
    assert!(!Arc::ptr_eq(&a.repository(), &b.repository()));
    assert!(Arc::ptr_eq(&a.repository().context(), &b.repository().context()));
}

#[test]
fn dependency_is_not_taken_from_the_root_tier() {
    let container = Container::builder()
        .options(ServiceOptions::new().dependencies(DependencyOptions::new("Repositories")))
        .build()
        .unwrap();
    container.root().add::<dyn Customer, RetailCustomer>().unwrap();
    container.root().add::<dyn Repository, SqlRepository>().unwrap();

    match container.get_service::<dyn Customer>() {
        Err(StrataError::ContractNotRegistered(e)) => {
            assert!(e.contract.type_name().contains("Repository"));
            assert_eq!(e.tier, "shared");
        }
        other => panic!("Expected ContractNotRegistered, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn missing_dependency_of_a_dependency_names_its_parent() {
    let container = Container::builder()
        .options(ServiceOptions::new().dependencies(DependencyOptions::new("Repositories")))
        .build()
        .unwrap();
    container.root().add::<dyn Customer, RetailCustomer>().unwrap();
    container
        .dependency_tier("Repositories")
        .unwrap()
        .add::<dyn Repository, SqlRepository>()
        .unwrap();

    match container.get_service::<dyn Customer>() {
        Err(StrataError::ContractNotRegistered(e)) => {
            assert!(e.contract.type_name().contains("DbContext"));
            let parent = e.required_by.expect("parent contract");
            assert!(parent.type_name().contains("Repository"));
        }
        other => panic!("Expected ContractNotRegistered, got: {:?}", other.map(|_| ())),
    }

    container.shared().add::<dyn DbContext, SqlContext>().unwrap();
    assert!(container.get_service::<dyn Customer>().is_ok());
}

// ============================================================
// Reuse sets
// ============================================================

trait Level3: Send + Sync {}
trait Level2: Send + Sync {
    fn level3(&self) -> Arc<dyn Level3>;
}
trait Level1: Send + Sync {
    fn level3(&self) -> Arc<dyn Level3>;
}
trait Level0: Send + Sync {
    fn parts(&self) -> (Arc<dyn Level1>, Arc<dyn Level2>, Arc<dyn Level3>);
}

struct Leaf;
impl Level3 for Leaf {}

struct Middle {
    level3: Arc<dyn Level3>,
}

impl Level2 for Middle {
    fn level3(&self) -> Arc<dyn Level3> {
        self.level3.clone()
    }
}

impl Injectable for Middle {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Middle { level3: args.required()? }))
            .param(Parameter::of::<dyn Level3>("level3"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Level2>(|s| s);
    }
}

struct Upper {
    level3: Arc<dyn Level3>,
}

impl Level1 for Upper {
    fn level3(&self) -> Arc<dyn Level3> {
        self.level3.clone()
    }
}

impl Injectable for Upper {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Upper { level3: args.required()? }))
            .param(Parameter::of::<dyn Level3>("level3"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Level1>(|s| s);
    }
}

struct Top {
    level1: Arc<dyn Level1>,
    level2: Arc<dyn Level2>,
    level3: Arc<dyn Level3>,
}

impl Level0 for Top {
    fn parts(&self) -> (Arc<dyn Level1>, Arc<dyn Level2>, Arc<dyn Level3>) {
        (self.level1.clone(), self.level2.clone(), self.level3.clone())
    }
}

impl Injectable for Top {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(Top {
                level3: args.required()?,
                level1: args.required()?,
                level2: args.required()?,
            })
        })
        .param(Parameter::of::<dyn Level3>("level3"))
        .param(Parameter::of::<dyn Level1>("level1"))
        .param(Parameter::of::<dyn Level2>("level2"))
        .reuse::<dyn Level3>()]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Level0>(|s| s);
    }
}

fn levels() -> Container {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Level0, Top>().unwrap();
    container
        .shared()
        .add::<dyn Level1, Upper>()
        .unwrap()
        .add::<dyn Level2, Middle>()
        .unwrap()
        .add_factory::<dyn Level3, _>(None, || Ok(Arc::new(Leaf) as Arc<dyn Level3>))
        .unwrap();
    container
}

#[test]
fn reuse_set_shares_one_instance_across_the_graph() {
    let container = levels();

    let top = container.get_service::<dyn Level0>().unwrap();
    let (level1, level2, level3) = top.parts();
    assert!(Arc::ptr_eq(&level3, &level1.level3()));
    assert!(Arc::ptr_eq(&level3, &level2.level3()));
}

#[test]
fn reuse_set_is_scoped_to_one_resolution() {
    let container = levels();

    let (_, _, first) = container.get_service::<dyn Level0>().unwrap().parts();
    let (_, _, second) = container.get_service::<dyn Level0>().unwrap().parts();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn singleton_dependency_keeps_its_own_graph() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Level0, Top>().unwrap();
    container
        .shared()
        .add_singleton::<dyn Level1, Upper>()
        .unwrap()
        .add::<dyn Level2, Middle>()
        .unwrap()
        .add_factory::<dyn Level3, _>(None, || Ok(Arc::new(Leaf) as Arc<dyn Level3>))
        .unwrap();

    let (first_upper, first_middle, first_leaf) = container.get_service::<dyn Level0>().unwrap().parts();
    let (second_upper, _, second_leaf) = container.get_service::<dyn Level0>().unwrap().parts();

    assert!(Arc::ptr_eq(&first_upper, &second_upper));
    assert!(Arc::ptr_eq(&first_middle.level3(), &first_leaf));
    assert!(!Arc::ptr_eq(&first_upper.level3(), &first_leaf));
    assert!(!Arc::ptr_eq(&second_upper.level3(), &second_leaf));
}

#[test]
fn without_reuse_factories_build_fresh_instances() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Level1, Upper>().unwrap();
    container.root().add::<dyn Level2, Middle>().unwrap();
    container
        .shared()
        .add_factory::<dyn Level3, _>(None, || Ok(Arc::new(Leaf) as Arc<dyn Level3>))
        .unwrap();

    let a = container.get_service::<dyn Level1>().unwrap();
    let b = container.get_service::<dyn Level2>().unwrap();
    assert!(!Arc::ptr_eq(&a.level3(), &b.level3()));
}

// ============================================================
// Parameter routing
// ============================================================

trait Clock: Send + Sync {
    fn source(&self) -> &'static str;
}

trait Scheduler: Send + Sync {
    fn clock(&self) -> Arc<dyn Clock>;
}

struct NamedClock(&'static str);

impl Clock for NamedClock {
    fn source(&self) -> &'static str {
        self.0
    }
}

struct ExternalScheduler {
    clock: Arc<dyn Clock>,
}

impl Scheduler for ExternalScheduler {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

impl Injectable for ExternalScheduler {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(ExternalScheduler { clock: args.required()? }))
            .param(Parameter::of::<dyn Clock>("clock").external("c2"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Scheduler>(|s| s);
    }
}

struct LocalScheduler {
    clock: Arc<dyn Clock>,
}

impl Scheduler for LocalScheduler {
    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

impl Injectable for LocalScheduler {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(LocalScheduler { clock: args.required()? }))
            .param(Parameter::of::<dyn Clock>("clock").from_self())]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Scheduler>(|s| s);
    }
}

fn chained() -> Container {
    let container = Container::builder()
        .options(ServiceOptions::new().dependencies(DependencyOptions::new("C1").dependencies(DependencyOptions::new("C2"))))
        .build()
        .unwrap();
    for (tier, label) in [
        (container.root(), "root"),
        (container.dependency_tier("C1").unwrap(), "c1"),
        (container.dependency_tier("C2").unwrap(), "c2"),
        (container.shared(), "shared"),
    ] {
        tier.add_factory::<dyn Clock, _>(None, move || Ok(Arc::new(NamedClock(label)) as Arc<dyn Clock>))
            .unwrap();
    }
    container
}

#[test]
fn chain_parameter_comes_from_the_next_tier() {
    let container = chained();
    container.root().add::<dyn Level1, Upper>().unwrap();
    container
        .dependency_tier("C1")
        .unwrap()
        .add_factory::<dyn Level3, _>(None, || Ok(Arc::new(Leaf) as Arc<dyn Level3>))
        .unwrap();

    assert!(container.get_service::<dyn Level1>().is_ok());
}

#[test]
fn external_parameter_skips_to_the_named_tier() {
    let container = chained();
    container.root().add::<dyn Scheduler, ExternalScheduler>().unwrap();

    let scheduler = container.get_service::<dyn Scheduler>().unwrap();
    assert_eq!(scheduler.clock().source(), "c2");
}

#[test]
fn external_parameter_to_an_unknown_tier_fails() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Scheduler, ExternalScheduler>().unwrap();
    container
        .shared()
        .add_factory::<dyn Clock, _>(None, || Ok(Arc::new(NamedClock("shared")) as Arc<dyn Clock>))
        .unwrap();

    match container.get_service::<dyn Scheduler>() {
        Err(StrataError::ContractNotRegistered(e)) => assert_eq!(e.tier, "c2"),
        other => panic!("Expected ContractNotRegistered, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn self_parameter_stays_in_the_requesting_tier() {
    let container = chained();
    container.root().add::<dyn Scheduler, LocalScheduler>().unwrap();

    let scheduler = container.get_service::<dyn Scheduler>().unwrap();
    assert_eq!(scheduler.clock().source(), "root");
}

// ============================================================
// Optional and ignored parameters
// ============================================================

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

trait Checkout: Send + Sync {
    fn notifier(&self) -> Option<Arc<dyn Notifier>>;
}

#[derive(Default)]
struct Email;

impl Notifier for Email {
    fn channel(&self) -> &'static str {
        "email"
    }
}

impl Injectable for Email {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_new()]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Notifier>(|s| s);
    }
}

struct OptionalCheckout {
    notifier: Option<Arc<dyn Notifier>>,
}

impl Checkout for OptionalCheckout {
    fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.clone()
    }
}

impl Injectable for OptionalCheckout {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(OptionalCheckout { notifier: args.next()? }))
            .param(Parameter::of::<dyn Notifier>("notifier").optional())]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Checkout>(|s| s);
    }
}

struct SilentCheckout {
    notifier: Option<Arc<dyn Notifier>>,
}

impl Checkout for SilentCheckout {
    fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.clone()
    }
}

impl Injectable for SilentCheckout {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(SilentCheckout { notifier: args.next()? }))
            .param(Parameter::of::<dyn Notifier>("notifier").ignored())]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Checkout>(|s| s);
    }
}

#[test]
fn optional_parameter_is_injected_once_registered() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Checkout, OptionalCheckout>().unwrap();

    let before = container.get_service::<dyn Checkout>().unwrap();
    assert!(before.notifier().is_none());

    container.shared().add::<dyn Notifier, Email>().unwrap();

    let after = container.get_service::<dyn Checkout>().unwrap();
    assert_eq!(after.notifier().unwrap().channel(), "email");
}

#[test]
fn ignored_parameter_is_never_resolved() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Checkout, SilentCheckout>().unwrap();
    container.shared().add::<dyn Notifier, Email>().unwrap();

    let checkout = container.get_service::<dyn Checkout>().unwrap();
    assert!(checkout.notifier().is_none());
}

// ============================================================
// Cycles
// ============================================================

trait Alpha: Send + Sync {}
trait Beta: Send + Sync {}

struct NeedsBeta;
impl Alpha for NeedsBeta {}

impl Injectable for NeedsBeta {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            args.required::<dyn Beta>()?;
            Ok(NeedsBeta)
        })
        .param(Parameter::of::<dyn Beta>("beta"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Alpha>(|s| s);
    }
}

struct NeedsAlpha;
impl Beta for NeedsAlpha {}

impl Injectable for NeedsAlpha {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            args.required::<dyn Alpha>()?;
            Ok(NeedsAlpha)
        })
        .param(Parameter::of::<dyn Alpha>("alpha"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Beta>(|s| s);
    }
}

#[test]
fn circular_dependency_is_reported() {
    let container = Container::builder()
        .options(ServiceOptions::new().model(ContainerModel::Single))
        .build()
        .unwrap();
    container.root().add::<dyn Alpha, NeedsBeta>().unwrap();
    container.root().add::<dyn Beta, NeedsAlpha>().unwrap();

    match container.get_service::<dyn Alpha>() {
        Err(StrataError::CircularDependency(e)) => {
            assert_eq!(e.chain.len(), 3);
            assert_eq!(e.chain.first(), e.chain.last());
        }
        other => panic!("Expected CircularDependency, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn cycle_inside_the_shared_tier_is_reported() {
    let container = Container::builder().build().unwrap();
    container.root().add::<dyn Alpha, NeedsBeta>().unwrap();
    container.shared().add::<dyn Beta, NeedsAlpha>().unwrap();
    container.shared().add::<dyn Alpha, NeedsBeta>().unwrap();

    assert!(matches!(
        container.get_service::<dyn Alpha>(),
        Err(StrataError::CircularDependency(_))
    ));
}

// ============================================================
// Single model
// ============================================================

#[test]
fn single_model_resolves_within_the_root() {
    let container = Container::builder()
        .options(ServiceOptions::new().model(ContainerModel::Single))
        .build()
        .unwrap();
    container.root().add::<dyn Repository, SqlRepository>().unwrap();
    container.shared().add::<dyn DbContext, SqlContext>().unwrap();

    assert!(matches!(
        container.get_service::<dyn Repository>(),
        Err(StrataError::ContractNotRegistered(_))
    ));

    container.root().add::<dyn DbContext, SqlContext>().unwrap();
    let repository = container.get_service::<dyn Repository>().unwrap();
    assert_eq!(repository.context().connection(), "sql");
}
