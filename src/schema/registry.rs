//! Static table definitions for the retail sample model.

use super::types::{Category, DatasetDescriptor, FieldSpec, FieldType, TableSchema};
use crate::error::{IngestError, Result};

// =============================================================================
// Fact tables
// =============================================================================

pub static FACT_SALES: DatasetDescriptor = DatasetDescriptor {
    table_name: "sales",
    category: Category::Fact,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("OrderKey", FieldType::Integer),
            FieldSpec::nullable("LineNumber", FieldType::Integer),
            FieldSpec::nullable("OrderDate", FieldType::Date),
            FieldSpec::nullable("DeliveryDate", FieldType::Date),
            FieldSpec::nullable("CustomerKey", FieldType::Integer),
            FieldSpec::nullable("StoreKey", FieldType::Integer),
            FieldSpec::nullable("ProductKey", FieldType::Integer),
            FieldSpec::nullable("Quantity", FieldType::Integer),
            FieldSpec::nullable("UnitPrice", FieldType::Double),
            FieldSpec::nullable("NetPrice", FieldType::Double),
            FieldSpec::nullable("UnitCost", FieldType::Double),
            FieldSpec::nullable("CurrencyCode", FieldType::String),
            FieldSpec::nullable("ExchangeRate", FieldType::Double),
        ],
    },
};

pub static FACT_CURRENCY_EXCHANGE: DatasetDescriptor = DatasetDescriptor {
    table_name: "currencyexchange",
    category: Category::Fact,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("Date", FieldType::Date),
            FieldSpec::nullable("FromCurrency", FieldType::String),
            FieldSpec::nullable("ToCurrency", FieldType::String),
            FieldSpec::nullable("Exchange", FieldType::Double),
        ],
    },
};

// =============================================================================
// Dimension tables
// =============================================================================

pub static DIM_CUSTOMER: DatasetDescriptor = DatasetDescriptor {
    table_name: "customer",
    category: Category::Dim,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("CustomerKey", FieldType::Integer),
            FieldSpec::nullable("GeoAreaKey", FieldType::Integer),
            FieldSpec::nullable("StartDT", FieldType::Date),
            FieldSpec::nullable("EndDT", FieldType::Date),
            FieldSpec::nullable("Continent", FieldType::String),
            FieldSpec::nullable("Gender", FieldType::String),
            FieldSpec::nullable("Title", FieldType::String),
            FieldSpec::nullable("GivenName", FieldType::String),
            FieldSpec::nullable("MiddleInitial", FieldType::String),
            FieldSpec::nullable("Surname", FieldType::String),
            FieldSpec::nullable("StreetAddress", FieldType::String),
            FieldSpec::nullable("City", FieldType::String),
            FieldSpec::nullable("State", FieldType::String),
            FieldSpec::nullable("StateFull", FieldType::String),
            FieldSpec::nullable("ZipCode", FieldType::String),
            FieldSpec::nullable("Country", FieldType::String),
            FieldSpec::nullable("CountryFull", FieldType::String),
            FieldSpec::nullable("Birthday", FieldType::Date),
            FieldSpec::nullable("Age", FieldType::Integer),
            FieldSpec::nullable("Occupation", FieldType::String),
            FieldSpec::nullable("Company", FieldType::String),
            FieldSpec::nullable("Vehicle", FieldType::String),
            FieldSpec::nullable("Latitude", FieldType::Double),
            FieldSpec::nullable("Longitude", FieldType::Double),
        ],
    },
};

pub static DIM_PRODUCT: DatasetDescriptor = DatasetDescriptor {
    table_name: "product",
    category: Category::Dim,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("ProductKey", FieldType::Integer),
            FieldSpec::nullable("ProductCode", FieldType::String),
            FieldSpec::nullable("ProductName", FieldType::String),
            FieldSpec::nullable("Manufacturer", FieldType::String),
            FieldSpec::nullable("Brand", FieldType::String),
            FieldSpec::nullable("Color", FieldType::String),
            FieldSpec::nullable("WeightUnit", FieldType::String),
            FieldSpec::nullable("Weight", FieldType::Double),
            FieldSpec::nullable("Cost", FieldType::Double),
            FieldSpec::nullable("Price", FieldType::Double),
            FieldSpec::nullable("CategoryKey", FieldType::Integer),
            FieldSpec::nullable("CategoryName", FieldType::String),
            FieldSpec::nullable("SubCategoryKey", FieldType::Integer),
            FieldSpec::nullable("SubCategoryName", FieldType::String),
        ],
    },
};

pub static DIM_STORE: DatasetDescriptor = DatasetDescriptor {
    table_name: "store",
    category: Category::Dim,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("StoreKey", FieldType::Integer),
            FieldSpec::nullable("StoreCode", FieldType::String),
            FieldSpec::nullable("GeoAreaKey", FieldType::Integer),
            FieldSpec::nullable("CountryCode", FieldType::String),
            FieldSpec::nullable("CountryName", FieldType::String),
            FieldSpec::nullable("State", FieldType::String),
            FieldSpec::nullable("OpenDate", FieldType::Date),
            FieldSpec::nullable("CloseDate", FieldType::Date),
            FieldSpec::nullable("Description", FieldType::String),
            FieldSpec::nullable("SquareMeters", FieldType::Double),
            FieldSpec::nullable("Status", FieldType::String),
        ],
    },
};

pub static DIM_DATE: DatasetDescriptor = DatasetDescriptor {
    table_name: "date",
    category: Category::Dim,
    schema: TableSchema {
        fields: &[
            FieldSpec::nullable("Date", FieldType::Date),
            FieldSpec::nullable("DateKey", FieldType::Integer),
            FieldSpec::nullable("Year", FieldType::Integer),
            FieldSpec::nullable("YearQuarter", FieldType::String),
            FieldSpec::nullable("YearQuarterNumber", FieldType::Integer),
            FieldSpec::nullable("Quarter", FieldType::String),
            FieldSpec::nullable("YearMonth", FieldType::String),
            FieldSpec::nullable("YearMonthShort", FieldType::String),
            FieldSpec::nullable("YearMonthNumber", FieldType::Integer),
            FieldSpec::nullable("Month", FieldType::String),
            FieldSpec::nullable("MonthShort", FieldType::String),
            FieldSpec::nullable("MonthNumber", FieldType::Integer),
            FieldSpec::nullable("DayofWeek", FieldType::String),
            FieldSpec::nullable("DayofWeekShort", FieldType::String),
            FieldSpec::nullable("DayofWeekNumber", FieldType::Integer),
            FieldSpec::nullable("WorkingDay", FieldType::String),
            FieldSpec::nullable("WorkingDayNumber", FieldType::Integer),
        ],
    },
};

static REGISTERED: [&DatasetDescriptor; 6] = [
    &FACT_SALES,
    &DIM_CUSTOMER,
    &DIM_PRODUCT,
    &DIM_STORE,
    &DIM_DATE,
    &FACT_CURRENCY_EXCHANGE,
];

/// Every known table, in load order.
pub fn registered() -> &'static [&'static DatasetDescriptor] {
    &REGISTERED
}

/// The tables loaded by a default run: sales, customer, product, store, date.
pub fn default_datasets() -> Vec<DatasetDescriptor> {
    [&FACT_SALES, &DIM_CUSTOMER, &DIM_PRODUCT, &DIM_STORE, &DIM_DATE]
        .into_iter()
        .copied()
        .collect()
}

pub fn descriptor(table_name: &str) -> Result<&'static DatasetDescriptor> {
    REGISTERED
        .iter()
        .copied()
        .find(|d| d.table_name == table_name)
        .ok_or_else(|| IngestError::SchemaNotFound {
            table_name: table_name.to_string(),
        })
}

pub fn get_schema(table_name: &str) -> Result<&'static TableSchema> {
    descriptor(table_name).map(|d| &d.schema)
}
