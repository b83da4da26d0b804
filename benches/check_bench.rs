use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagefit::snapshot::MeasuredElement;
use pagefit::{PageFitChecker, PageFitConfig};

// A body with `sections` sections of `rows` rows each, all within budget.
fn invoice_tree(sections: usize, rows: usize) -> MeasuredElement {
    let children = (0..sections)
        .map(|s| {
            let lines = (0..rows)
                .map(|r| MeasuredElement::new(format!("row-{}-{}", s, r), 754.0, 18.0).with_tag("tr"))
                .collect();
            MeasuredElement::new(format!("section-{}", s), 774.0, 18.0 * rows as f64)
                .with_tag("section")
                .with_style("break-inside", "avoid")
                .with_children(lines)
        })
        .collect();
    MeasuredElement::new("", 774.0, 1100.0)
        .with_tag("body")
        .with_children(children)
}

fn bench_check_snapshot(c: &mut Criterion) {
    let checker = PageFitChecker::new(PageFitConfig::default()).unwrap();
    let body = invoice_tree(50, 40);

    c.bench_function("check_snapshot_2k_elements", |b| {
        b.iter(|| checker.check_document(black_box(&body)).unwrap())
    });
}

fn bench_render_and_check(c: &mut Criterion) {
    #[cfg(feature = "html")]
    {
        use pagefit::rendering::render_html;
        use pagefit::Viewport;

        let rows: String = (0..200)
            .map(|i| format!("<tr><td>Item {}</td><td class=\"amount\">{}.00</td></tr>", i, i))
            .collect();
        let html = format!(
            r#"<html><head><style>
                body {{ margin: 20px; font-size: 12px }}
                .amount {{ width: 120px }}
                @media print {{ #totals {{ break-inside: avoid }} }}
            </style></head>
            <body><table id="items">{}</table><div id="totals">Total</div></body></html>"#,
            rows
        );
        let checker = PageFitChecker::new(PageFitConfig::default()).unwrap();

        c.bench_function("render_and_check_invoice", |b| {
            b.iter(|| {
                let doc = render_html(black_box(&html), &[], Viewport::default()).unwrap();
                let _ = checker.check_document(&doc.body);
            })
        });
    }
    #[cfg(not(feature = "html"))]
    let _ = c;
}

criterion_group!(benches, bench_check_snapshot, bench_render_and_check);
criterion_main!(benches);
