/// lifecycle - complete loan lifecycle from origination to payoff
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_servicing_rs::{
    EngineConfig, InMemoryAuditLog, InMemoryLoanRepository, LoanServicer, LoanStatus, LoanTerms,
    Money, PaymentIntent, PaymentMethod, Rate, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== loan lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let servicer = LoanServicer::new(
        InMemoryLoanRepository::new(),
        InMemoryAuditLog::new(),
        EngineConfig::default(),
    )?;

    // 1. origination
    println!("1. origination phase");
    println!("-------------------");
    let terms = LoanTerms::new(
        Money::from_major(10_000),
        Rate::from_percentage(12),
        6,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    );
    let loan_id = servicer.originate(&terms, &time)?.loan_id();
    println!("  status: {:?}", servicer.view(loan_id)?.status);

    servicer.approve(loan_id, &time)?;
    println!("  ✓ loan approved");
    servicer.activate(loan_id, &time)?;
    println!("  ✓ funds disbursed");
    println!("  status: {:?}", servicer.view(loan_id)?.status);

    // 2. normal servicing
    println!("\n2. normal servicing phase");
    println!("-------------------------");
    for month in 1..=3 {
        controller.advance(Duration::days(30));
        let view = servicer.view(loan_id)?;
        let due = match view.next_payment {
            Some(next) => next.amount_due,
            None => break,
        };

        let intent = PaymentIntent::new(loan_id, due, PaymentMethod::BankTransfer);
        servicer.apply_payment(&intent, &time)?;
        println!("\n  month {}: {}", month, time.now().format("%Y-%m-%d"));
        println!("    ✓ paid ${}", due);
        println!("    remaining balance: ${}", servicer.view(loan_id)?.outstanding_balance);
    }

    // 3. a short payment is rejected and changes nothing
    println!("\n3. rejected payment");
    println!("-------------------");
    let short = PaymentIntent::new(loan_id, Money::from_major(100), PaymentMethod::Cash);
    match servicer.apply_payment(&short, &time) {
        Ok(_) => println!("  unexpected: short payment accepted"),
        Err(e) => println!("  ✗ {}", e),
    }

    // 4. payoff
    println!("\n4. payoff phase");
    println!("---------------");
    controller.advance(Duration::days(30));
    let view = servicer.view(loan_id)?;
    let payoff = match &view.next_payment {
        Some(next) => next.amount_due + (view.outstanding_balance - next.principal_portion),
        None => view.outstanding_balance,
    };
    let intent = PaymentIntent::new(loan_id, payoff, PaymentMethod::BankTransfer)
        .with_reference("PAYOFF")
        .with_notes("early settlement");
    let outcome = servicer.apply_payment(&intent, &time)?;
    println!("  paid ${} (covers next installment and full balance)", payoff);
    println!("  unapplied: ${}", outcome.unapplied_amount);

    let view = servicer.view(loan_id)?;
    println!("  status: {:?}", view.status);
    println!("  cancelled installments: {}", view.cancelled_installments);
    println!("  total interest paid: ${}", view.interest_paid);
    assert_eq!(view.status, LoanStatus::Completed);

    println!("\n5. final state");
    println!("--------------");
    println!("{}", view.to_json_pretty()?);

    Ok(())
}
