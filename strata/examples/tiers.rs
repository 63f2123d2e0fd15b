//! A shop wired across three tiers.
//!
//! Run with `cargo run -p strata --example tiers`.

use std::sync::Arc;

use strata::prelude::*;

// === Contracts ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

trait DbContext: Send + Sync {
    fn url(&self) -> &str;
}

trait CustomerRepository: Send + Sync {
    fn find(&self, id: u64) -> String;
}

trait CustomerService: Send + Sync {
    fn describe(&self, id: u64) -> String;
}

// === Implementations ===

#[derive(Default)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

impl Injectable for ConsoleLogger {
    const REUSABLE: bool = true;

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_new()]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn Logger>(|s| s);
    }
}

struct PgContext {
    url: String,
}

impl DbContext for PgContext {
    fn url(&self) -> &str {
        &self.url
    }
}

struct SqlCustomers {
    db: Arc<dyn DbContext>,
    logger: Arc<dyn Logger>,
}

impl CustomerRepository for SqlCustomers {
    fn find(&self, id: u64) -> String {
        self.logger.log(&format!("SELECT * FROM customers WHERE id = {id}"));
        format!("customer #{id} from {}", self.db.url())
    }
}

impl Injectable for SqlCustomers {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(SqlCustomers { db: args.required()?, logger: args.required()? })
        })
        .param(Parameter::of::<dyn DbContext>("db"))
        .param(Parameter::of::<dyn Logger>("logger"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn CustomerRepository>(|s| s);
    }
}

struct Customers {
    repository: Arc<dyn CustomerRepository>,
    logger: Arc<dyn Logger>,
}

impl CustomerService for Customers {
    fn describe(&self, id: u64) -> String {
        self.logger.log(&format!("Describing customer {id}"));
        self.repository.find(id)
    }
}

impl Injectable for Customers {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| {
            Ok(Customers { repository: args.required()?, logger: args.required()? })
        })
        .param(Parameter::of::<dyn CustomerRepository>("repository"))
        .param(Parameter::of::<dyn Logger>("logger"))]
    }

    fn contracts(casts: &mut Casts<Self>) {
        casts.add::<dyn CustomerService>(|s| s);
    }
}

// === Decorator ===

struct Timing;

impl Decorator for Timing {
    fn before(&self, context: &mut ServiceCallContext) {
        println!("→ resolving {}", context.contract().short_name());
    }

    fn after(&self, context: &mut ServiceCallContext) {
        println!("← resolved {} ({})", context.contract().short_name(), context.service_type());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("strata=debug").init();

    let container = Container::builder()
        .options(ServiceOptions::new().dependencies(DependencyOptions::new("Repositories")))
        .decorate_all(Timing)
        .build()?;

    container.root().add::<dyn CustomerService, Customers>()?;
    container
        .dependency_tier("Repositories")?
        .add::<dyn CustomerRepository, SqlCustomers>()?;
    container
        .shared()
        .add::<dyn Logger, ConsoleLogger>()?
        .add_factory::<dyn DbContext, _>(None, || {
            Ok(Arc::new(PgContext { url: "postgres://localhost/shop".into() }) as Arc<dyn DbContext>)
        })?;

    println!("{container}");

    let customers = container.get_service::<dyn CustomerService>()?;
    println!("{}", customers.describe(7));

    // Swapping the database recompiles the customer service on next use.
    container.shared().replace_factory::<dyn DbContext, _>(None, || {
        Ok(Arc::new(PgContext { url: "postgres://replica/shop".into() }) as Arc<dyn DbContext>)
    })?;
    let customers = container.get_service::<dyn CustomerService>()?;
    println!("{}", customers.describe(7));

    match container.get_service::<dyn DbContext>() {
        Ok(_) => println!("DbContext unexpectedly registered on the root tier"),
        Err(e) => println!("Expected error:\n{e}"),
    }

    Ok(())
}
