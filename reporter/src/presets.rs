//! Built-in sales reports over the point-of-sale schema
//! (`sales`, `sale_items`, `products`).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::errors::QueryError;
use common::models::chart::ColumnMapping;
use common::models::query::{QueryDescriptor, QueryParam};

const DAILY_SALES_SQL: &str = "\
SELECT DATE(s.sale_date) AS sale_day, \
       SUM(s.total_amount) AS total_sales, \
       SUM((SELECT COUNT(*) FROM sale_items si WHERE si.sale_id = s.id)) AS items_sold, \
       ROUND(AVG(s.total_amount), 2) AS average_sale \
FROM sales s \
WHERE s.sale_date BETWEEN ? AND ? \
GROUP BY DATE(s.sale_date) \
ORDER BY sale_day";

const PRODUCT_PERFORMANCE_SQL: &str = "\
SELECT p.name AS product, \
       SUM(si.quantity) AS quantity_sold, \
       SUM(si.quantity * si.unit_price) AS revenue \
FROM sale_items si \
JOIN products p ON si.product_id = p.id \
JOIN sales s ON si.sale_id = s.id \
WHERE s.sale_date BETWEEN ? AND ? \
GROUP BY p.id, p.name \
ORDER BY revenue DESC";

/// A canned report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Total and average sale per day.
    DailySales,
    /// Revenue and quantity per product.
    ProductPerformance,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Preset::DailySales => "daily-sales",
            Preset::ProductPerformance => "product-performance",
        }
    }

    /// Query and mapping for the inclusive day range `from..=to`.
    pub fn build(
        self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<(QueryDescriptor, ColumnMapping), QueryError> {
        let (start, end) = day_bounds(from, to);
        let params = vec![QueryParam::DateTime(start), QueryParam::DateTime(end)];
        let period = format!("{} to {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"));

        match self {
            Preset::DailySales => Ok((
                QueryDescriptor::new(DAILY_SALES_SQL, params)?,
                ColumnMapping::new("sale_day", ["total_sales", "average_sale"])
                    .with_title(format!("Daily sales, {}", period))
                    .with_x_label("Day")
                    .with_y_label("Amount"),
            )),
            Preset::ProductPerformance => Ok((
                QueryDescriptor::new(PRODUCT_PERFORMANCE_SQL, params)?,
                ColumnMapping::new("product", ["revenue", "quantity_sold"])
                    .with_title(format!("Product performance, {}", period))
                    .with_x_label("Product")
                    .with_y_label("Revenue / quantity"),
            )),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "daily-sales" => Ok(Preset::DailySales),
            "product-performance" => Ok(Preset::ProductPerformance),
            other => Err(format!("unknown report preset: {}", other)),
        }
    }
}

/// First and last instant of the day range.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let last = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
    (from.and_time(NaiveTime::MIN), to.and_time(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_daily_sales_covers_whole_days() {
        let (query, mapping) = Preset::DailySales.build(day(1), day(7)).unwrap();
        assert_eq!(query.params().len(), 2);
        assert_eq!(
            query.params()[0],
            QueryParam::DateTime(day(1).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            query.params()[1],
            QueryParam::DateTime(day(7).and_hms_micro_opt(23, 59, 59, 999_999).unwrap())
        );
        assert_eq!(mapping.x, "sale_day");
        assert_eq!(mapping.y, vec!["total_sales", "average_sale"]);
        assert_eq!(
            mapping.title.as_deref(),
            Some("Daily sales, 2024-03-01 to 2024-03-07")
        );
    }

    #[test]
    fn test_product_performance_maps_categories() {
        let (query, mapping) = Preset::ProductPerformance.build(day(1), day(1)).unwrap();
        assert!(query.sql().contains("GROUP BY p.id, p.name"));
        assert_eq!(mapping.x, "product");
        assert_eq!(mapping.y, vec!["revenue", "quantity_sold"]);
    }

    #[test]
    fn test_preset_sql_is_a_read_query() {
        use common::utils::SqlValidator;
        for preset in [Preset::DailySales, Preset::ProductPerformance] {
            let (query, _) = preset.build(day(1), day(2)).unwrap();
            assert!(SqlValidator::validate(query.sql()).is_ok(), "{}", preset);
        }
    }

    #[test]
    fn test_parse_preset_names() {
        assert_eq!("daily-sales".parse::<Preset>(), Ok(Preset::DailySales));
        assert_eq!(
            "PRODUCT_PERFORMANCE".parse::<Preset>(),
            Ok(Preset::ProductPerformance)
        );
        assert!("sdg".parse::<Preset>().is_err());
    }
}
